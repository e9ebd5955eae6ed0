//! Display layer boundary
//!
//! `ViewReconciler` is what the core drives; the map widget and listing
//! panel live behind it. `ConsoleView` is the text implementation used by
//! the CLI.

use crate::domain::types::{Coordinate, Establishment};
use std::io::Write;
use tracing::error;

pub trait ViewReconciler: Send {
    /// Replace the displayed places (markers and listing)
    fn render(&mut self, establishments: &[Establishment]);

    /// Move (or create) the user marker
    fn show_user_position(&mut self, at: Coordinate);

    /// Remove the user marker
    fn clear_user_position(&mut self);

    /// Surface the resolved address of the user's first fix
    fn show_address(&mut self, address: &str);

    /// One-line message for the user (errors, login prompts)
    fn show_notice(&mut self, message: &str);
}

/// One listing row: name, category, stars, rating and summary
pub fn format_listing(est: &Establishment) -> String {
    let rating = if est.rating.is_finite() { est.rating.clamp(0.0, 5.0) } else { 0.0 };
    let stars = "★".repeat(rating.floor() as usize);
    let mut line = format!("{} [{}] {} {:.1}/5", est.name, est.category, stars, rating);
    let summary = est.summary();
    if !summary.is_empty() {
        line.push_str(" - ");
        line.push_str(summary);
    }
    line
}

pub struct ConsoleView {
    out: Box<dyn Write + Send>,
}

impl ConsoleView {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|_| self.out.flush()) {
            error!(error = %e, "console_write_failed");
        }
    }
}

impl ViewReconciler for ConsoleView {
    fn render(&mut self, establishments: &[Establishment]) {
        if establishments.is_empty() {
            self.line("No places found");
            return;
        }
        for est in establishments {
            let row = format_listing(est);
            self.line(&row);
        }
    }

    fn show_user_position(&mut self, at: Coordinate) {
        self.line(&format!("You are here: {:.6}, {:.6}", at.latitude, at.longitude));
    }

    fn clear_user_position(&mut self) {
        self.line("Location tracking off");
    }

    fn show_address(&mut self, address: &str) {
        self.line(&format!("Your location is: {address}"));
    }

    fn show_notice(&mut self, message: &str) {
        self.line(message);
    }
}
