//! Point labels follow the field convention "site-depth", e.g. "G1-2.5"
//! for site G1 at 2.5 m. Both halves are optional in practice.

pub fn parse_site_and_depth(label: &str) -> (Option<String>, Option<f64>) {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return (None, None);
    }
    let mut parts = trimmed.splitn(2, '-');
    let site = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let depth = parts
        .next()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite());
    (site, depth)
}

pub fn format_depth_for_label(depth_m: f64) -> String {
    if !depth_m.is_finite() || depth_m == 0.0 {
        return "0".to_string();
    }
    let magnitude = depth_m.abs();
    let formatted = if (0.001..=1000.0).contains(&magnitude) {
        let s = format!("{depth_m:.6}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        format!("{depth_m:.6e}")
    };
    if formatted.is_empty() {
        "0".to_string()
    } else {
        formatted
    }
}

pub fn build_stratified_label(site: &str, depth_m: f64) -> String {
    let site = site.trim();
    let site = if site.is_empty() { "unnamed" } else { site };
    format!("{site}-{}", format_depth_for_label(depth_m))
}

/// Explicit site/depth fields win; whatever is missing is parsed from the
/// label.
pub fn resolve_site_and_depth(
    label: &str,
    site: Option<&str>,
    depth_m: Option<f64>,
) -> (Option<String>, Option<f64>) {
    let fixed_site = site
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let fixed_depth = depth_m.filter(|d| d.is_finite());
    if fixed_site.is_some() && fixed_depth.is_some() {
        return (fixed_site, fixed_depth);
    }

    let (parsed_site, parsed_depth) = parse_site_and_depth(label);
    (fixed_site.or(parsed_site), fixed_depth.or(parsed_depth))
}
