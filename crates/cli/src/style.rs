//! Terminal styling for `blockrev` output.

use console::Style;

use blockrev_core::diff::ChangeAction;
use blockrev_core::version::ChangeType;

/// Prefix `msg` with a colored status glyph.
fn marked(glyph: &str, style: Style, msg: &str) -> String {
    format!("{} {}", style.apply_to(glyph), msg)
}

pub fn success(msg: &str) -> String {
    marked("✓", Style::new().green(), msg)
}

pub fn error(msg: &str) -> String {
    marked("✗", Style::new().red(), msg)
}

pub fn warn(msg: &str) -> String {
    marked("⚠", Style::new().yellow(), msg)
}

/// Bold text for section titles and the next version in `bump`.
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// Dimmed text for block paths.
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Colored label for a block change action.
pub fn action(action: ChangeAction) -> String {
    let style = match action {
        ChangeAction::Added => Style::new().green(),
        ChangeAction::Removed => Style::new().red(),
        ChangeAction::Modified => Style::new().yellow(),
        ChangeAction::Moved => Style::new().cyan(),
    };
    style.apply_to(action).to_string()
}

/// Colored label for a change severity. Major is loudest.
pub fn severity(kind: ChangeType) -> String {
    let style = match kind {
        ChangeType::Major => Style::new().red().bold(),
        ChangeType::Minor => Style::new().yellow().bold(),
        ChangeType::Patch => Style::new().green().bold(),
        ChangeType::None => Style::new().dim(),
    };
    style.apply_to(kind).to_string()
}
