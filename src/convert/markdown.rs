/*!
 * Markdown Rendering
 * CommonMark with the extensions document authors actually use
 */

use comrak::markdown_to_html;
use comrak::options::Options;

pub(super) fn to_html(content: &str) -> String {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    markdown_to_html(content, &options)
}
