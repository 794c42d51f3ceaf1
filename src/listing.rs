//! HTML listing of the files in the content directory.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt::Write as _;
use std::io;
use std::path::Path;

/// Characters escaped in listing links.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A regular file shown in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    pub size: u64,
}

/// Human-readable size with two decimals: `"1.50 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    const SUFFIXES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SUFFIXES.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, SUFFIXES[unit])
}

/// Regular files directly inside `dir`, sorted by name.
///
/// Symlinks are followed, the same way files are served. Subdirectories,
/// dangling links and non-UTF-8 names are skipped. A missing `dir` lists as
/// empty.
pub fn files_in_directory(dir: &Path) -> io::Result<Vec<ListedFile>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let Ok(metadata) = std::fs::metadata(entry.path()) else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            files.push(ListedFile {
                name,
                size: metadata.len(),
            });
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Render the listing page for `dir`.
pub fn render_listing(dir: &Path, files: &[ListedFile]) -> String {
    let mut html = String::new();
    html.push_str(
        "<html><head><title>Content Directory</title></head>\
         <body style=\"background-color:#248779\">",
    );
    let _ = write!(
        html,
        "<h1>Content Directory: {}</h1><ul>",
        escape_html(&dir.display().to_string())
    );
    for file in files {
        let _ = write!(
            html,
            "<li><a href=\"{}\">{}</a> ({})</li>",
            utf8_percent_encode(&file.name, HREF),
            escape_html(&file.name),
            format_file_size(file.size)
        );
    }
    html.push_str("</ul></body></html>");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
