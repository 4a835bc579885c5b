use colored::{Color, Colorize};

const BANNER: &[&str] = &[
    r"    __________  ___       ______            __",
    r"   / ____/ __ \/   |     /_  __/___  ____  / /",
    r"  / __/ / / / / /| |      / / / __ \/ __ \/ / ",
    r" / /___/ /_/ / ___ |     / / / /_/ / /_/ / /  ",
    r"/_____/_____/_/  |_|    /_/  \____/\____/_/   ",
];

const RAINBOW: &[Color] = &[
    Color::BrightRed,
    Color::Yellow,
    Color::BrightGreen,
    Color::BrightBlue,
    Color::BrightMagenta,
];

/// Prints the banner to stderr so piped reports stay clean.
pub fn print_banner() {
    for (line, color) in BANNER.iter().zip(RAINBOW.iter().cycle()) {
        eprintln!("{}", line.color(*color).bold());
    }
    eprintln!("\n{}", "Exploratory Data Analysis Tool".white().dimmed());
}
