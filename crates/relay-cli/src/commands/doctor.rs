//! `relay doctor`: diagnose the local setup

use anyhow::{Result, bail};
use relay_core::Settings;
use relay_core::doctor::{CheckStatus, run_doctor};

fn icon(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "✅",
        CheckStatus::Warn => "⚠️ ",
        CheckStatus::Fail => "❌",
        CheckStatus::Skip => "⏭️ ",
    }
}

pub async fn run(settings: &Settings) -> Result<()> {
    println!("🩺 Relay Doctor");
    println!("==============\n");

    let report = run_doctor(settings).await;
    for check in &report.checks {
        println!("  {} {}: {}", icon(check.status), check.name, check.message);
        if let Some(hint) = &check.fix_hint {
            println!("       → {}", hint);
        }
    }

    println!();
    if report.is_healthy() {
        println!("  🎉 {}", report.summary());
        Ok(())
    } else {
        println!("  ⚠️  {}", report.summary());
        bail!("{} check(s) failed", report.fail_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icons_are_distinct() {
        let icons = [
            icon(CheckStatus::Pass),
            icon(CheckStatus::Warn),
            icon(CheckStatus::Fail),
            icon(CheckStatus::Skip),
        ];
        for (i, a) in icons.iter().enumerate() {
            for b in &icons[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
