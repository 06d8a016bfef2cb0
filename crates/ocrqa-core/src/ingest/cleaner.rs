//! Repairs common OCR damage in technical text before extraction.

use once_cell::sync::Lazy;
use regex::Regex;

/// Abbreviations OCR tends to split or lower-case, with the variants seen.
const ABBREVIATIONS: &[(&str, &[&str])] = &[
    ("PCIe", &["pcie", "pci-e", "pci e", "pc ie"]),
    ("GPIO", &["gpio", "gp io"]),
    ("VBUS", &["vbus", "v bus"]),
    ("UART", &["uart", "u art"]),
    ("I2C", &["i2c", "i 2c", "i 2 c"]),
    ("SPI", &["spi", "s pi"]),
    ("USB", &["usb", "u sb"]),
    ("BIOS", &["bios", "bi os"]),
    ("DDR4", &["ddr4", "ddr 4"]),
    ("DIMM", &["dimm", "di mm"]),
    ("CPU", &["cpu", "c pu"]),
    ("MHz", &["mhz", "m hz"]),
    ("GHz", &["ghz", "g hz"]),
];

static ABBREVIATION_FIXES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ABBREVIATIONS
        .iter()
        .map(|(correct, variants)| {
            let alternatives: Vec<String> = variants.iter().map(|v| regex::escape(v)).collect();
            let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
            (Regex::new(&pattern).expect("static regex"), *correct)
        })
        .collect()
});

static NUMBER_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d) ?(ns|us|µs|μs|ms|mV|V|mA|µA|μA|uA|A|Hz|kHz|KHz|MHz|GHz)\b")
        .expect("static regex")
});

static HEX_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0X([0-9A-Fa-f]+)\b").expect("static regex"));

static PLUS_MINUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+ ?/ ?-").expect("static regex"));

static DIGIT_CONFUSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([lO])(\d+)\b").expect("static regex"));

static COMPLIANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"FCC\s+[Ss]tatement",
        r"|[Ss]afety\s+[Ww]arning",
        r"|[Cc]ompliance\s+[Nn]ote",
        r"|[Ww]arranty\s+[Dd]isclaimer",
        r"|[Ll]egal\s+[Nn]otice",
        r"|This\s+device\s+complies\s+with",
        r"|[Cc]aution:.*electric\s+shock",
    ))
    .expect("static regex")
});

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z]+:").expect("static regex"));

static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrCleaner {
    remove_compliance: bool,
}

impl Default for OcrCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrCleaner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            remove_compliance: true,
        }
    }

    #[must_use]
    pub fn with_compliance_removal(mut self, enabled: bool) -> Self {
        self.remove_compliance = enabled;
        self
    }

    /// Runs every repair. Runs of spaces inside a line are kept because they
    /// carry table columns.
    #[must_use]
    pub fn clean(&self, text: &str) -> String {
        let mut text = text.replace("\r\n", "\n").replace('\r', "\n");

        for (pattern, correct) in ABBREVIATION_FIXES.iter() {
            text = pattern.replace_all(&text, *correct).into_owned();
        }
        text = NUMBER_UNIT.replace_all(&text, "$1$2").into_owned();
        text = HEX_PREFIX.replace_all(&text, "0x$1").into_owned();
        text = PLUS_MINUS.replace_all(&text, "±").into_owned();
        text = DIGIT_CONFUSION
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let digit = if &caps[1] == "l" { "1" } else { "0" };
                format!("{digit}{}", &caps[2])
            })
            .into_owned();

        if self.remove_compliance {
            text = remove_compliance_sections(&text);
        }

        let trimmed: Vec<&str> = text.lines().map(str::trim_end).collect();
        let text = trimmed.join("\n");
        EXCESS_NEWLINES
            .replace_all(&text, "\n\n")
            .trim_matches('\n')
            .to_string()
    }
}

/// Drops boilerplate from its trigger phrase up to the next blank line or
/// `Heading:` line. Text before the trigger on the same line is kept.
fn remove_compliance_sections(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut removing = false;
    let mut removed = 0usize;

    for line in text.split('\n') {
        if removing {
            if line.trim().is_empty() || HEADING.is_match(line) {
                removing = false;
            } else {
                continue;
            }
        }

        match COMPLIANCE.find(line) {
            Some(m) => {
                removed += 1;
                removing = true;
                let before = line[..m.start()].trim_end();
                if !before.is_empty() {
                    kept.push(before);
                }
            }
            None => kept.push(line),
        }
    }

    if removed > 0 {
        tracing::debug!(sections = removed, "removed compliance boilerplate");
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_abbreviations_are_joined() {
        let cleaner = OcrCleaner::new();
        assert_eq!(
            cleaner.clean("Connect the GP IO header to V BUS over u sb"),
            "Connect the GPIO header to VBUS over USB"
        );
    }

    #[test]
    fn test_units_and_hex() {
        let cleaner = OcrCleaner::new();
        assert_eq!(
            cleaner.clean("VDD_CORE = 1.8 V +/- 5%\nCTRL_REG = 0X1A"),
            "VDD_CORE = 1.8V ± 5%\nCTRL_REG = 0x1A"
        );
        assert_eq!(cleaner.clean("Pin l2 = SDA, Pin O5 = SCL"), "Pin 12 = SDA, Pin 05 = SCL");
    }

    #[test]
    fn test_table_spacing_is_preserved() {
        let cleaner = OcrCleaner::new();
        let text = "Parameter      Min    Max\nSupply voltage   1.7V   1.9V   \n";
        assert_eq!(
            cleaner.clean(text),
            "Parameter      Min    Max\nSupply voltage   1.7V   1.9V"
        );
    }

    #[test]
    fn test_compliance_paragraph_removed() {
        let cleaner = OcrCleaner::new();
        let text = "Pin 1 = VBUS\n\nFCC Statement: This equipment has been tested\nand found to comply.\n\nPin 2 = GND";
        assert_eq!(cleaner.clean(text), "Pin 1 = VBUS\n\nPin 2 = GND");
    }

    #[test]
    fn test_compliance_removal_stops_at_heading() {
        let cleaner = OcrCleaner::new();
        let text = "Safety Warning: do not open the case\nkeep away from water\nNote: Pin 3 = SDA";
        assert_eq!(cleaner.clean(text), "Note: Pin 3 = SDA");

        let keep = OcrCleaner::new().with_compliance_removal(false);
        assert!(keep.clean(text).starts_with("Safety Warning"));
    }

    #[test]
    fn test_excess_blank_lines_collapse() {
        let cleaner = OcrCleaner::new();
        assert_eq!(cleaner.clean("a\n\n\n\n\nb\r\nc"), "a\n\nb\nc");
    }
}
