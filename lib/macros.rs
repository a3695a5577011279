//! Macros for clap help text.

/// Build an "Examples:" help block from `"command" # "description"` pairs.
#[macro_export]
macro_rules! examples {
    ($($cmd:literal # $desc:literal),* $(,)?) => {
        $crate::examples_section!["Examples:"; $($cmd # $desc),*]
    };
}

/// Build a titled help block from `"command" # "description"` pairs.
#[macro_export]
macro_rules! examples_section {
    ($title:literal; $($cmd:literal # $desc:literal),* $(,)?) => {
        concat!(
            "\x1b[1;33m", $title, "\x1b[0m",
            $("\n  \x1b[36m", $cmd, "\x1b[0m  ", $desc),*
        )
    };
}
