//! User-Friendly Error Formatting
//!
//! Provides user-friendly error messages with troubleshooting hints
//! for common error scenarios.

use std::fmt::Write;

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    // Header
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Analyze error and provide context
    let error_msg = error.to_string();
    let lower = error_msg.to_lowercase();

    if lower.contains("portal") || lower.contains("destination context") {
        format_portal_error(&mut output, &error_msg);
    } else if lower.contains("serial") || lower.contains("tty") || lower.contains("channel") {
        format_serial_error(&mut output, &error_msg);
    } else if lower.contains("config") {
        format_config_error(&mut output, &error_msg);
    } else {
        format_generic_error(&mut output, &error_msg);
    }

    // Technical details
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    // Footer with help
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: keycourier -vv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Report issues: https://github.com/keycourier/keycourier/issues"
    )
    .ok();

    output
}

fn format_portal_error(output: &mut String, _error: &str) {
    writeln!(output, "Input Injection Permission Error").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "Could not access the input injection system (xdg-desktop-portal)."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Portal permission denied").ok();
    writeln!(
        output,
        "     → When the dialog appears, click 'Allow' or 'Share'"
    )
    .ok();
    writeln!(output, "     → Run the transfer again if you clicked 'Deny'").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Portal is not running").ok();
    writeln!(
        output,
        "     → Run: systemctl --user status xdg-desktop-portal"
    )
    .ok();
    writeln!(
        output,
        "     → If not running: systemctl --user start xdg-desktop-portal"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  3. Portal backend not installed").ok();
    writeln!(
        output,
        "     → For GNOME: sudo apt install xdg-desktop-portal-gnome"
    )
    .ok();
    writeln!(
        output,
        "     → For KDE: sudo apt install xdg-desktop-portal-kde"
    )
    .ok();
    writeln!(
        output,
        "     → For wlroots: sudo apt install xdg-desktop-portal-wlr"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  4. Not running in a Wayland session").ok();
    writeln!(
        output,
        "     → Check: echo $WAYLAND_DISPLAY (should not be empty)"
    )
    .ok();
}

fn format_serial_error(output: &mut String, _error: &str) {
    writeln!(output, "Serial Link Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not open or write to the serial device.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Device not connected or wrong port").ok();
    writeln!(output, "     → List ports: ls /dev/ttyACM* /dev/ttyUSB*").ok();
    writeln!(
        output,
        "     → Pass the right one: keycourier --serial /dev/ttyACM0 ..."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. No permission to access the device").ok();
    writeln!(
        output,
        "     → Add your user to the dialout group: sudo usermod -aG dialout $USER"
    )
    .ok();
    writeln!(output, "     → Log out and log back in").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Another program holds the port").ok();
    writeln!(
        output,
        "     → Close serial monitors (minicom, screen, IDE consoles)"
    )
    .ok();
}

fn format_config_error(output: &mut String, _error: &str) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "The configuration file could not be loaded.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Syntax error in config.toml").ok();
    writeln!(
        output,
        "     → Check the TOML syntax near the line mentioned below"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid values").ok();
    writeln!(
        output,
        "     → chunk_size must be a positive multiple of 3; baud must be 115200"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  3. Wrong file location").ok();
    writeln!(
        output,
        "     → Default: ~/.config/keycourier/config.toml (or pass --config)"
    )
    .ok();
}

fn format_generic_error(output: &mut String, _error: &str) {
    writeln!(output, "Unexpected Error").ok();
    writeln!(output).ok();
    writeln!(output, "The transfer could not be completed.").ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output, "  → Re-run with -vv to capture debug logs").ok();
    writeln!(output, "  → Check the technical details below").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_error_gets_portal_hints() {
        let err = anyhow::anyhow!("Failed to reach the RemoteDesktop portal");
        let formatted = format_user_error(&err);
        assert!(formatted.contains("xdg-desktop-portal"));
        assert!(formatted.contains("Technical Details"));
    }

    #[test]
    fn test_serial_error_gets_serial_hints() {
        let err = anyhow::anyhow!("Failed to open output channel: /dev/ttyACM0: no such device");
        let formatted = format_user_error(&err);
        assert!(formatted.contains("dialout"));
    }

    #[test]
    fn test_config_error_gets_config_hints() {
        let err = anyhow::anyhow!("Failed to parse config file");
        let formatted = format_user_error(&err);
        assert!(formatted.contains("config.toml"));
    }

    #[test]
    fn test_generic_error_fallback() {
        let err = anyhow::anyhow!("something odd happened");
        let formatted = format_user_error(&err);
        assert!(formatted.contains("Unexpected Error"));
    }
}
