//! SVG rendering for EAN-13 labels.

use std::fmt::Write as _;

use super::Ean13;

/// Layout for a rendered label. Units are SVG user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgOptions {
    pub module_width: f32,
    pub bar_height: f32,
    /// Print the digits under the bars.
    pub show_text: bool,
    pub font_size: f32,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            module_width: 2.0,
            bar_height: 70.0,
            show_text: true,
            font_size: 14.0,
        }
    }
}

// GS1 minimum quiet zones, in modules
const LEFT_QUIET: u16 = 11;
const RIGHT_QUIET: u16 = 7;

const fn is_guard(module: usize) -> bool {
    module < 3 || (module >= 45 && module < 50) || module >= 92
}

/// Render a standalone SVG document for `code`.
#[must_use]
pub fn render(code: &Ean13, opts: SvgOptions) -> String {
    let mw = opts.module_width;
    let guard_extra = if opts.show_text { opts.font_size * 0.6 } else { 0.0 };
    let text_band = if opts.show_text { opts.font_size + 4.0 } else { 0.0 };
    let width = f32::from(LEFT_QUIET + 95 + RIGHT_QUIET) * mw;
    let height = opts.bar_height + text_band;
    let x0 = f32::from(LEFT_QUIET) * mw;

    let mut svg = String::with_capacity(4096);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" role="img" aria-label="EAN-13 {code}">"#
    );
    let _ = write!(
        svg,
        r##"<rect width="{width}" height="{height}" fill="#ffffff"/><g fill="#000000">"##
    );

    // Merge adjacent dark modules into a single rect
    let modules = code.modules();
    let mut i = 0;
    while i < modules.len() {
        if !modules.get(i).copied().unwrap_or(false) {
            i += 1;
            continue;
        }
        let start = i;
        while modules.get(i).copied().unwrap_or(false) && is_guard(i) == is_guard(start) {
            i += 1;
        }
        let h = if is_guard(start) {
            opts.bar_height + guard_extra
        } else {
            opts.bar_height
        };
        #[allow(clippy::cast_precision_loss)]
        let (x, w) = (x0 + start as f32 * mw, (i - start) as f32 * mw);
        let _ = write!(svg, r#"<rect x="{x}" y="0" width="{w}" height="{h}"/>"#);
    }
    svg.push_str("</g>");

    if opts.show_text {
        let digits = code.as_str();
        let y = opts.bar_height + opts.font_size;
        let fs = opts.font_size;
        let text = |svg: &mut String, x: f32, s: &str, spacing: &str| {
            let _ = write!(
                svg,
                r#"<text x="{x}" y="{y}" font-family="monospace" font-size="{fs}" text-anchor="middle"{spacing}>{s}</text>"#
            );
        };
        text(&mut svg, x0 - 6.0 * mw, digits.get(..1).unwrap_or(""), "");
        let spread = format!(r#" textLength="{}""#, 40.0 * mw);
        text(&mut svg, x0 + 24.0 * mw, digits.get(1..7).unwrap_or(""), &spread);
        text(&mut svg, x0 + 71.0 * mw, digits.get(7..).unwrap_or(""), &spread);
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn renders_well_formed_document() {
        let code = Ean13::parse("8469677112348").unwrap();
        let svg = render(&code, SvgOptions::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r#"aria-label="EAN-13 8469677112348""#));
        assert!(svg.contains(">8</text>"));
        assert!(svg.contains(">469677</text>"));
        assert!(svg.contains(">112348</text>"));
    }

    #[test]
    fn bar_widths_cover_all_dark_modules() {
        let code = Ean13::parse("4006381333931").unwrap();
        let opts = SvgOptions {
            module_width: 1.0,
            show_text: false,
            ..SvgOptions::default()
        };
        let svg = render(&code, opts);
        let dark = code.modules().iter().filter(|m| **m).count();
        let total: f32 = svg
            .split(r#" width=""#)
            .skip(3)
            .filter_map(|rest| rest.split('"').next())
            .filter_map(|w| w.parse::<f32>().ok())
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let expected = dark as f32;
        assert!((total - expected).abs() < f32::EPSILON);
        assert!(!svg.contains("<text"));
    }
}
