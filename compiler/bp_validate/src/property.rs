//! Property values as seen by validation rules.

use std::any::Any;
use std::fmt::Display;

/// Static classification of a property type, deciding which rules apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyShape {
    /// String-typed.
    Text,
    /// Signed or unsigned integer.
    Integer,
    /// Anything else with a string rendering.
    Display,
}

/// Borrowed view of one property value.
pub enum PropertyView<'a> {
    Null,
    Str(&'a str),
    /// Integer widened to `i128`, exact for every 64-bit value.
    Integer(i128),
    Display(&'a dyn Display),
}

impl PropertyView<'_> {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyView::Null)
    }

    /// String rendering used by pattern rules.
    pub fn render(&self) -> Option<String> {
        match self {
            PropertyView::Str(s) => Some((*s).to_owned()),
            PropertyView::Integer(i) => Some(i.to_string()),
            PropertyView::Display(d) => Some(d.to_string()),
            PropertyView::Null => None,
        }
    }
}

/// A type that can appear as a validated property.
///
/// Implemented for strings, integers, `bool`, `char`, floats and `Option`
/// of any of them. `Option<P>` is the nullable form of `P`.
pub trait Property: Any + Send + Sync {
    const SHAPE: PropertyShape;
    const NULLABLE: bool = false;

    fn view(&self) -> PropertyView<'_>;
}

impl Property for String {
    const SHAPE: PropertyShape = PropertyShape::Text;

    fn view(&self) -> PropertyView<'_> {
        PropertyView::Str(self)
    }
}

impl Property for &'static str {
    const SHAPE: PropertyShape = PropertyShape::Text;

    fn view(&self) -> PropertyView<'_> {
        PropertyView::Str(self)
    }
}

macro_rules! integer_property {
    ($($ty:ty),*) => {
        $(
            impl Property for $ty {
                const SHAPE: PropertyShape = PropertyShape::Integer;

                fn view(&self) -> PropertyView<'_> {
                    PropertyView::Integer(i128::from(*self))
                }
            }
        )*
    };
}

integer_property!(i8, i16, i32, i64, u8, u16, u32, u64);

impl Property for isize {
    const SHAPE: PropertyShape = PropertyShape::Integer;

    fn view(&self) -> PropertyView<'_> {
        // isize is at most 64 bits on every supported target.
        PropertyView::Integer(*self as i128)
    }
}

impl Property for usize {
    const SHAPE: PropertyShape = PropertyShape::Integer;

    fn view(&self) -> PropertyView<'_> {
        PropertyView::Integer(*self as i128)
    }
}

macro_rules! display_property {
    ($($ty:ty),*) => {
        $(
            impl Property for $ty {
                const SHAPE: PropertyShape = PropertyShape::Display;

                fn view(&self) -> PropertyView<'_> {
                    PropertyView::Display(self)
                }
            }
        )*
    };
}

display_property!(bool, char, f32, f64);

impl<P: Property> Property for Option<P> {
    const SHAPE: PropertyShape = P::SHAPE;
    const NULLABLE: bool = true;

    fn view(&self) -> PropertyView<'_> {
        match self {
            Some(inner) => inner.view(),
            None => PropertyView::Null,
        }
    }
}
