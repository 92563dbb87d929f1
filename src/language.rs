use std::path::Path;

/// Extensions `execute` understands, paired with the language name the
/// service expects.
pub const EXTENSIONS: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("php", "php"),
    ("pl", "perl"),
    ("go", "go"),
    ("sh", "shell"),
    ("html", "html"),
];

/// Guess the language of a source file from its extension (case-insensitive).
pub fn detect(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}
