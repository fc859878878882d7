//! Fixed repository files: README, LICENSE, and the per-round README section.

use crate::model::Round;

pub const HOMEPAGE_PATH: &str = "index.html";
pub const README_PATH: &str = "README.md";
pub const LICENSE_PATH: &str = "LICENSE";

pub fn readme(task: &str, brief: &str, pages_url: &str) -> String {
    format!(
        "# {task}\n\n\
         {brief}\n\n\
         ## Live site\n\n\
         {pages_url}\n\n\
         ## Files\n\n\
         - `index.html`: the whole site, a single self-contained page.\n\
         - `LICENSE`: MIT.\n\n\
         This repository was auto-generated.\n"
    )
}

/// Section appended to the README for a revision round.
pub fn revision_section(round: Round, brief: &str) -> String {
    format!("\n## Round {round}\n\n{brief}\n")
}

/// Existing README with a revision section appended.
pub fn append_revision(existing: &str, round: Round, brief: &str) -> String {
    let mut text = existing.trim_end().to_string();
    text.push('\n');
    text.push_str(&revision_section(round, brief));
    text
}

pub fn mit_license(year: i32, holder: &str) -> String {
    format!(
        "MIT License\n\
         \n\
         Copyright (c) {year} {holder}\n\
         \n\
         Permission is hereby granted, free of charge, to any person obtaining a copy\n\
         of this software and associated documentation files (the \"Software\"), to deal\n\
         in the Software without restriction, including without limitation the rights\n\
         to use, copy, modify, merge, publish, distribute, sublicense, and/or sell\n\
         copies of the Software, and to permit persons to whom the Software is\n\
         furnished to do so, subject to the following conditions:\n\
         \n\
         The above copyright notice and this permission notice shall be included in all\n\
         copies or substantial portions of the Software.\n\
         \n\
         THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR\n\
         IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,\n\
         FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE\n\
         AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER\n\
         LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,\n\
         OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE\n\
         SOFTWARE.\n"
    )
}
