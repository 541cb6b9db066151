use colored::Colorize;

use crate::error::Result;
use crate::settings::{load_settings, save_settings};

pub fn show() -> Result<()> {
    let s = load_settings();
    let on_off = |v: bool| if v { "on".green() } else { "off".red() };
    println!("Notification settings:");
    println!("  enabled:               {}", on_off(s.enabled));
    println!("  min_amount:            {}", crate::fmt::money(s.min_amount));
    println!("  include_credits:       {}", on_off(s.include_credits));
    println!("  include_debits:        {}", on_off(s.include_debits));
    println!("  notification_cooldown: {}s", s.notification_cooldown);
    println!("  exclude_categories:    {}", join_or_none(&s.exclude_categories));
    println!("  exclude_vendors:       {}", join_or_none(&s.exclude_vendors));
    Ok(())
}

pub fn set(key: &str, value: &str) -> Result<()> {
    let mut s = load_settings();
    s.set(key, value)?;
    save_settings(&s)?;
    println!("{} {key} set to {value}", "✓".green());
    Ok(())
}

pub fn toggle() -> Result<()> {
    let mut s = load_settings();
    s.enabled = !s.enabled;
    save_settings(&s)?;
    let state = if s.enabled { "enabled" } else { "disabled" };
    println!("{} notifications {state}", "✓".green());
    Ok(())
}

fn join_or_none(list: &[String]) -> String {
    if list.is_empty() {
        "(none)".to_string()
    } else {
        list.join(", ")
    }
}
