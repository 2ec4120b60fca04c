// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{ErrorContext, SyncLockError};
use colored::{ColoredString, Colorize};

pub fn format_error_chain(error: &SyncLockError) -> String {
    ErrorContext::new(error).to_string()
}

fn paint(text: &str, use_color: bool, style: fn(&str) -> ColoredString) -> String {
    if use_color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

/// Renders an error with its details and a bulleted suggestion list.
///
/// `use_color` is decided by the caller (stderr being a terminal); `colored`
/// still honors `NO_COLOR` and `CLICOLOR_FORCE` on top of that.
pub fn format_error_with_color(error: &SyncLockError, use_color: bool) -> String {
    let context = ErrorContext::new(error);
    let mut lines = vec![format!(
        "{} {error}",
        paint("Error:", use_color, |t| t.red().bold())
    )];

    if let Some(details) = &context.details {
        lines.push(String::new());
        lines.push(details.clone());
    }

    if let Some(suggestion) = &context.suggestion {
        lines.push(String::new());
        lines.push(paint("Suggestions:", use_color, |t| t.yellow().bold()));
        lines.extend(
            suggestion
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| paint(&format!("• {line}"), use_color, |t| t.cyan())),
        );
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}
