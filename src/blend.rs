use crate::color::{BLACK, Color};

/// Additively mixes the given colors, saturating each channel at 255.
///
/// Input order does not matter.
pub fn blend<I>(colors: I) -> Color
where
    I: IntoIterator<Item = Color>,
{
    colors.into_iter().fold(BLACK, Color::saturating_add)
}
