// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Spinner shown on stderr while a cluster query runs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// A spinner that draws nothing, for snapshot mode and piped output
pub fn hidden_spinner() -> ProgressBar {
    ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_message() {
        let pb = create_spinner("Listing pods...");
        assert_eq!(pb.message(), "Listing pods...");
        pb.finish_and_clear();
    }

    #[test]
    fn test_hidden_spinner() {
        let pb = hidden_spinner();
        assert!(pb.is_hidden());
        pb.set_message("ignored");
        pb.finish_and_clear();
    }
}
