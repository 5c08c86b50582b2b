use super::model::{Background, Peak, Region};

/// A background paired with the peak it is subtracted from.
#[derive(Debug, Clone, PartialEq)]
pub struct Association<'a> {
    pub background: &'a Background,
    pub peak: &'a Peak,
}

/// Pair every background with its nearest peak.
///
/// Distance is the gap between the two intervals (zero when touching). On a
/// tie the peak that sorts first wins, so with sorted tables the result is
/// deterministic. Nothing is cached: call again after every edit.
pub fn associate<'a>(peaks: &'a [Peak], backgrounds: &'a [Background]) -> Vec<Association<'a>> {
    backgrounds
        .iter()
        .filter_map(|bg| {
            let b = bg.bounds();
            peaks
                .iter()
                .map(|p| (p, b.gap(&p.bounds())))
                .fold(None, |best: Option<(&Peak, f64)>, (p, d)| match best {
                    Some((_, bd)) if bd <= d => best,
                    _ => Some((p, d)),
                })
                .map(|(peak, _)| Association {
                    background: bg,
                    peak,
                })
        })
        .collect()
}

/// Backgrounds associated with the named peak, in table order.
pub fn backgrounds_for<'a>(
    peak_name: &str,
    peaks: &'a [Peak],
    backgrounds: &'a [Background],
) -> Vec<&'a Background> {
    associate(peaks, backgrounds)
        .into_iter()
        .filter(|a| a.peak.name() == peak_name)
        .map(|a| a.background)
        .collect()
}
