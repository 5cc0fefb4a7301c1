//! Dynamic properties.
//!
//! Algorithms expose their numeric parameters as named, typed and bounded properties. This
//! allows front ends to list, set, save and load them without knowing the concrete algorithm.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

/// Object with custom properties.
pub trait Properties {
    /// Get available properties.
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![]
    }

    fn props(&mut self) -> Vec<(&str, Property)> {
        self.props_mut()
            .into_iter()
            .map(|(n, p)| (n, p.into()))
            .collect()
    }

    /// Get owned snapshot of all properties, keyed by name.
    fn prop_map(&mut self) -> BTreeMap<String, Property> {
        self.props()
            .into_iter()
            .map(|(n, p)| (n.to_string(), p))
            .collect()
    }

    /// Set a single property from its textual form.
    ///
    /// # Arguments
    ///
    /// * `name` - name of the property.
    /// * `value` - value to parse according to the property's type.
    fn set_prop_str(&mut self, name: &str, value: &str) -> Result<()> {
        let (_, mut prop) = self
            .props_mut()
            .into_iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| Error::config(format!("unknown property {name}")))?;
        prop.parse(value)
            .map_err(|e| Error::config(format!("{name}: {e}")))
    }

    /// Set properties from a previously saved map.
    ///
    /// Every entry must name an existing property of the same type, and hold a value within
    /// the property's bounds. Nothing is modified if any entry is invalid.
    fn set_props(&mut self, props: &BTreeMap<String, Property>) -> Result<()> {
        let mut own = self.props_mut();

        for (name, value) in props {
            let (_, prop) = own
                .iter()
                .find(|(n, _)| *n == name.as_str())
                .ok_or_else(|| Error::config(format!("unknown property {name}")))?;
            prop.check(value)
                .map_err(|e| Error::config(format!("{name}: {e}")))?;
        }

        for (name, prop) in own.iter_mut() {
            if let Some(value) = props.get(*name) {
                prop.set(value);
            }
        }

        Ok(())
    }
}

/// Property with a lower and upper bound.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct BoundedProp<T> {
    pub val: T,
    pub min: T,
    pub max: T,
}

impl<T> Deref for BoundedProp<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.val
    }
}

impl<T> DerefMut for BoundedProp<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.val
    }
}

impl<'a, T: Copy> From<BoundedPropMut<'a, T>> for BoundedProp<T> {
    fn from(BoundedPropMut { val, min, max }: BoundedPropMut<'a, T>) -> Self {
        Self {
            val: *val,
            min,
            max,
        }
    }
}

/// Describes the type of a property.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Property {
    Bool(bool),
    Float(BoundedProp<f64>),
    Usize(BoundedProp<usize>),
}

impl<'a> From<PropertyMut<'a>> for Property {
    fn from(prop: PropertyMut<'a>) -> Self {
        match prop {
            PropertyMut::Bool(b) => Self::Bool(*b),
            PropertyMut::Float(p) => Self::Float(p.into()),
            PropertyMut::Usize(p) => Self::Usize(p.into()),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(p) => write!(f, "{} [{}; {}]", p.val, p.min, p.max),
            Self::Usize(p) => write!(f, "{} [{}; {}]", p.val, p.min, p.max),
        }
    }
}

/// Property with a lower and upper bound.
pub struct BoundedPropMut<'a, T> {
    pub val: &'a mut T,
    pub min: T,
    pub max: T,
}

impl<'a, T> Deref for BoundedPropMut<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.val
    }
}

impl<'a, T> DerefMut for BoundedPropMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.val
    }
}

impl<'a, T: PartialOrd + Copy + fmt::Display> BoundedPropMut<'a, T> {
    fn check(&self, val: T) -> std::result::Result<(), String> {
        if val >= self.min && val <= self.max {
            Ok(())
        } else {
            Err(format!("{val} is outside of [{}; {}]", self.min, self.max))
        }
    }

    fn try_set(&mut self, val: T) -> std::result::Result<(), String> {
        self.check(val)?;
        *self.val = val;
        Ok(())
    }
}

impl<'a, T: Copy> From<&'a mut BoundedProp<T>> for BoundedPropMut<'a, T> {
    fn from(prop: &'a mut BoundedProp<T>) -> Self {
        Self {
            val: &mut prop.val,
            min: prop.min,
            max: prop.max,
        }
    }
}

/// Describes the type of a property.
pub enum PropertyMut<'a> {
    Bool(&'a mut bool),
    Float(BoundedPropMut<'a, f64>),
    Usize(BoundedPropMut<'a, usize>),
}

impl<'a> From<&'a mut Property> for PropertyMut<'a> {
    fn from(prop: &'a mut Property) -> Self {
        match prop {
            Property::Bool(b) => Self::Bool(b),
            Property::Float(p) => Self::Float(p.into()),
            Property::Usize(p) => Self::Usize(p.into()),
        }
    }
}

fn parse<T: FromStr>(value: &str) -> std::result::Result<T, String>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value {value:?}: {e}"))
}

impl<'a> PropertyMut<'a> {
    /// Create a boolean property.
    ///
    /// # Arguments
    ///
    /// * `b` - reference to the underlying boolean to be mutated.
    pub fn bool(b: &'a mut bool) -> Self {
        Self::Bool(b)
    }

    /// Create a floating point property.
    ///
    /// # Arguments
    ///
    /// * `val` - reference to the underlying float to be mutated.
    /// * `min` - lowest value for the property.
    /// * `max` - highest value for the property.
    pub fn float(val: &'a mut f64, min: f64, max: f64) -> Self {
        Self::Float(BoundedPropMut { val, min, max })
    }

    /// Create an integer property.
    ///
    /// # Arguments
    ///
    /// * `val` - reference to the underlying usize to be mutated.
    /// * `min` - lowest value for the property.
    /// * `max` - highest value for the property.
    pub fn usize(val: &'a mut usize, min: usize, max: usize) -> Self {
        Self::Usize(BoundedPropMut { val, min, max })
    }

    /// Verify that `other` could be assigned to this property.
    pub fn check(&self, other: &Property) -> std::result::Result<(), String> {
        match (self, other) {
            (Self::Bool(_), Property::Bool(_)) => Ok(()),
            (Self::Float(p), Property::Float(o)) => p.check(o.val),
            (Self::Usize(p), Property::Usize(o)) => p.check(o.val),
            _ => Err("type mismatch".into()),
        }
    }

    /// Assign the value of `other`, if types match.
    ///
    /// Bounds are not verified here, use [`check`](Self::check) beforehand.
    pub fn set(&mut self, other: &Property) {
        match (self, other) {
            (Self::Bool(b), Property::Bool(ob)) => **b = *ob,
            (Self::Float(val), Property::Float(oval)) => *val.val = oval.val,
            (Self::Usize(val), Property::Usize(oval)) => *val.val = oval.val,
            _ => {}
        }
    }

    /// Parse and assign a value from text, verifying the bounds.
    pub fn parse(&mut self, value: &str) -> std::result::Result<(), String> {
        match self {
            Self::Bool(b) => {
                **b = parse(value)?;
                Ok(())
            }
            Self::Float(p) => {
                let v = parse::<f64>(value)?;
                if !v.is_finite() {
                    return Err(format!("{v} is not a finite number"));
                }
                p.try_set(v)
            }
            Self::Usize(p) => p.try_set(parse(value)?),
        }
    }
}
