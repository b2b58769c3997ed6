//! Shared UI icons.
//!
//! Each icon falls back to plain ASCII on terminals without emoji support.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static STOP: Emoji<'_, '_> = Emoji("⏹️  ", "[STOP] ");
pub static WAVE: Emoji<'_, '_> = Emoji("🌊 ", "");
