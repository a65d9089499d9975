//! Property declarations.
//!
//! A type opts into validation by implementing [`Validatable`] and listing
//! its properties in declaration order:
//!
//! ```ignore
//! impl Validatable for Signup {
//!     fn declare(schema: &mut SchemaBuilder<Self>) {
//!         schema.property("name", |s| &s.name).not_null().string_length(2, 40);
//!         schema.property("age", |s| &s.age).integer_range(18, 130);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use bp_ir::short_type_name;

use crate::{
    Annotation, CustomRef, CustomSource, CustomValidator, Property, PropertyShape, PropertyView,
};

/// A type whose instances can be validated.
///
/// `declare` runs once per type, the first time a validator for it is
/// requested. The default declares nothing, so the type always validates
/// successfully.
pub trait Validatable: Any + Send + Sync + Sized {
    fn declare(schema: &mut SchemaBuilder<Self>) {
        let _ = schema;
    }
}

/// Reads one property of `T`.
pub(crate) trait PropertyAccess<T>: Send + Sync {
    fn view<'a>(&self, target: &'a T) -> PropertyView<'a>;
    fn value<'a>(&self, target: &'a T) -> &'a dyn Any;
}

struct Accessor<P, F> {
    access: F,
    _property: PhantomData<fn() -> P>,
}

impl<T, P, F> PropertyAccess<T> for Accessor<P, F>
where
    P: Property,
    F: Fn(&T) -> &P + Send + Sync,
{
    fn view<'a>(&self, target: &'a T) -> PropertyView<'a> {
        (self.access)(target).view()
    }

    fn value<'a>(&self, target: &'a T) -> &'a dyn Any {
        (self.access)(target)
    }
}

/// One declared property and its annotations.
pub(crate) struct PropertyDecl<T> {
    pub name: &'static str,
    pub shape: PropertyShape,
    pub nullable: bool,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub access: Arc<dyn PropertyAccess<T>>,
    pub annotations: Vec<Annotation>,
}

/// Collects the property declarations of `T`.
pub struct SchemaBuilder<T> {
    pub(crate) properties: Vec<PropertyDecl<T>>,
}

impl<T: 'static> SchemaBuilder<T> {
    pub(crate) fn new() -> Self {
        SchemaBuilder {
            properties: Vec::new(),
        }
    }

    /// Declare property `name`, read through `access`.
    pub fn property<P, F>(&mut self, name: &'static str, access: F) -> PropertyBuilder<'_, T>
    where
        P: Property,
        F: Fn(&T) -> &P + Send + Sync + 'static,
    {
        self.properties.push(PropertyDecl {
            name,
            shape: P::SHAPE,
            nullable: P::NULLABLE,
            type_id: TypeId::of::<P>(),
            type_name: short_type_name(std::any::type_name::<P>()),
            access: Arc::new(Accessor {
                access,
                _property: PhantomData,
            }),
            annotations: Vec::new(),
        });
        let index = self.properties.len() - 1;
        PropertyBuilder {
            schema: self,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Attaches annotations to the property just declared.
pub struct PropertyBuilder<'s, T> {
    schema: &'s mut SchemaBuilder<T>,
    index: usize,
}

impl<T> PropertyBuilder<'_, T> {
    pub fn annotate(self, annotation: Annotation) -> Self {
        if let Some(decl) = self.schema.properties.get_mut(self.index) {
            decl.annotations.push(annotation);
        }
        self
    }

    pub fn not_null(self) -> Self {
        self.annotate(Annotation::NotNull)
    }

    /// Character count within `minimum..=maximum`; `maximum == 0` is
    /// unbounded.
    pub fn string_length(self, minimum: usize, maximum: usize) -> Self {
        self.annotate(Annotation::StringLength { minimum, maximum })
    }

    pub fn integer_range(self, minimum: i64, maximum: i64) -> Self {
        self.annotate(Annotation::IntegerRange {
            minimum: i128::from(minimum),
            maximum: i128::from(maximum),
        })
    }

    pub fn unsigned_range(self, minimum: u64, maximum: u64) -> Self {
        self.annotate(Annotation::IntegerRange {
            minimum: i128::from(minimum),
            maximum: i128::from(maximum),
        })
    }

    pub fn matches(self, pattern: &str) -> Self {
        self.annotate(Annotation::RegularExpressionMatch {
            pattern: Some(pattern.to_owned()),
        })
    }

    pub fn custom<V: CustomValidator>(self, validator: V) -> Self {
        self.annotate(Annotation::Custom(CustomSource::Instance(CustomRef::new(
            validator,
        ))))
    }

    /// Custom validator looked up by name in the compiler's registry.
    pub fn custom_named(self, name: &str) -> Self {
        self.annotate(Annotation::Custom(CustomSource::Named(name.to_owned())))
    }
}
