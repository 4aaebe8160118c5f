//! Closed categorical feature levels.
//!
//! Every categorical attribute of a mistake is a small closed enum (or a
//! `bool`). [`FeatureLevel`] exposes the declared set of levels, a stable
//! index into that set, and the label used when the level is rendered as a
//! one-hot feature name (e.g. `Hanging_Piece`, `True`).

use std::fmt;

/// A categorical value drawn from a closed, declared set of levels.
pub trait FeatureLevel: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// All levels in declaration order.
    const ALL: &'static [Self];

    /// Label used in feature names and serialized records.
    #[must_use]
    fn label(self) -> &'static str;

    /// Position of this level in [`FeatureLevel::ALL`].
    #[must_use]
    fn index(self) -> usize;

    /// Looks up a level by its label.
    #[must_use]
    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|level| level.label() == label)
    }
}

impl FeatureLevel for bool {
    const ALL: &'static [Self] = &[false, true];

    fn label(self) -> &'static str {
        if self { "True" } else { "False" }
    }

    fn index(self) -> usize {
        usize::from(self)
    }
}

/// Declares a closed feature enum together with its [`FeatureLevel`] impl.
///
/// Each variant is paired with the label it serializes to.
macro_rules! feature_level {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $label:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
            derive_more::Display,
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $label)]
                #[display($label)]
                $variant,
            )+
        }

        impl $crate::level::FeatureLevel for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            fn index(self) -> usize {
                self as usize
            }
        }
    };
}
