// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-buffered animatable properties.
//!
//! An [`AnimatableProperty`] keeps a *base value* alongside its two buffer
//! slots. Messages from the Event thread *bake* the base value; animations and
//! constraints *set* the current slot only. At the start of every frame a
//! resetter copies the base value back into the slot being updated, so that
//! per-frame writers always start from the same baseline.
//!
//! # Dirty flags
//!
//! A two-bit flag records how recently the value changed:
//!
//! | flag    | meaning                                                  |
//! |---------|----------------------------------------------------------|
//! | `CLEAN` | unchanged in this and the previous frame                 |
//! | `BAKED` | base value baked during the previous frame               |
//! | `SET`   | current slot set during the previous frame               |
//!
//! [`reset_to_base_value`](AnimatableProperty::reset_to_base_value) shifts the
//! flag right once per frame, so a `SET` property needs two resets (one per
//! slot) before it is clean again.

use core::fmt;

use crate::buffer::{BufferIndex, DoubleBuffered};
use crate::error::Error;
use crate::math::{Vector2, Vector3, Vector4};

/// Unchanged in this and the previous frame.
pub const CLEAN_FLAG: u8 = 0x00;
/// Baked during the previous frame.
pub const BAKED_FLAG: u8 = 0x01;
/// Set during the previous frame.
pub const SET_FLAG: u8 = 0x02;
/// Must be reset to the base value in the next two frames.
pub const RESET_FLAG: u8 = 0x02;

/// Type tag of a [`PropertyValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PropertyType {
    /// `bool`.
    Boolean = 0,
    /// `i32`.
    Integer = 1,
    /// `f32`.
    Float = 2,
    /// [`Vector2`].
    Vector2 = 3,
    /// [`Vector3`].
    Vector3 = 4,
    /// [`Vector4`].
    Vector4 = 5,
}

impl PropertyType {
    /// Decodes a type tag.
    #[must_use]
    pub const fn from_u32(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => Self::Boolean,
            1 => Self::Integer,
            2 => Self::Float,
            3 => Self::Vector2,
            4 => Self::Vector3,
            5 => Self::Vector4,
            _ => return None,
        })
    }
}

/// Index of a property within its owner's property table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyIndex(pub u32);

/// A dynamically typed property value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i32),
    /// Floating-point value.
    Float(f32),
    /// Two-component vector.
    Vector2(Vector2),
    /// Three-component vector.
    Vector3(Vector3),
    /// Four-component vector.
    Vector4(Vector4),
}

impl PropertyValue {
    /// Returns the type tag of this value.
    #[must_use]
    pub const fn property_type(&self) -> PropertyType {
        match self {
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Integer(_) => PropertyType::Integer,
            Self::Float(_) => PropertyType::Float,
            Self::Vector2(_) => PropertyType::Vector2,
            Self::Vector3(_) => PropertyType::Vector3,
            Self::Vector4(_) => PropertyType::Vector4,
        }
    }

    /// Packs the value into four `f32` lanes, the layout used in message
    /// payloads and uniform blocks.
    #[must_use]
    pub fn to_lanes(&self) -> [f32; 4] {
        match *self {
            Self::Boolean(b) => [if b { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            Self::Integer(i) => [f32::from_bits(i.cast_unsigned()), 0.0, 0.0, 0.0],
            Self::Float(f) => [f, 0.0, 0.0, 0.0],
            Self::Vector2(v) => [v.x, v.y, 0.0, 0.0],
            Self::Vector3(v) => [v.x, v.y, v.z, 0.0],
            Self::Vector4(v) => [v.x, v.y, v.z, v.w],
        }
    }

    /// Inverse of [`to_lanes`](Self::to_lanes).
    #[must_use]
    pub fn from_lanes(ty: PropertyType, lanes: [f32; 4]) -> Self {
        let [x, y, z, w] = lanes;
        match ty {
            PropertyType::Boolean => Self::Boolean(x != 0.0),
            PropertyType::Integer => Self::Integer(x.to_bits().cast_signed()),
            PropertyType::Float => Self::Float(x),
            PropertyType::Vector2 => Self::Vector2(Vector2::new(x, y)),
            PropertyType::Vector3 => Self::Vector3(Vector3::new(x, y, z)),
            PropertyType::Vector4 => Self::Vector4(Vector4::new(x, y, z, w)),
        }
    }
}

/// A value type that can live in an [`AnimatableProperty`].
pub trait AnimatableValue: Copy + PartialEq + fmt::Debug + 'static {
    /// The [`PropertyType`] tag for this type.
    const TYPE: PropertyType;

    /// Combines `self` with a relative `delta`.
    #[must_use]
    fn add_relative(self, delta: Self) -> Self;

    /// Wraps the value.
    fn to_value(self) -> PropertyValue;

    /// Unwraps a value of the matching type.
    fn from_value(value: PropertyValue) -> Option<Self>;
}

macro_rules! impl_animatable_value {
    ($ty:ty, $variant:ident, |$a:ident, $b:ident| $add:expr) => {
        impl AnimatableValue for $ty {
            const TYPE: PropertyType = PropertyType::$variant;

            #[inline]
            fn add_relative(self, delta: Self) -> Self {
                let ($a, $b) = (self, delta);
                $add
            }

            #[inline]
            fn to_value(self) -> PropertyValue {
                PropertyValue::$variant(self)
            }

            #[inline]
            fn from_value(value: PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

// Boolean "addition" is OR: false + false stays false, true + anything is true.
impl_animatable_value!(bool, Boolean, |a, b| a || b);
impl_animatable_value!(i32, Integer, |a, b| a.wrapping_add(b));
impl_animatable_value!(f32, Float, |a, b| a + b);
impl_animatable_value!(Vector2, Vector2, |a, b| a + b);
impl_animatable_value!(Vector3, Vector3, |a, b| a + b);
impl_animatable_value!(Vector4, Vector4, |a, b| a + b);

/// Object-safe view of an animatable property, used by resetters.
pub trait PropertyBase {
    /// Copies the base value into slot `index` if the property is not clean.
    fn reset_to_base_value(&mut self, index: BufferIndex);

    /// Forces two further resets.
    fn mark_as_dirty(&mut self);

    /// Whether the value is unchanged in this and the previous frame.
    fn is_clean(&self) -> bool;
}

/// A double-buffered property with a base value and dirty tracking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimatableProperty<T> {
    value: DoubleBuffered<T>,
    base_value: T,
    dirty_flags: u8,
}

impl<T: AnimatableValue> AnimatableProperty<T> {
    /// Creates a property whose base and both slots hold `initial`.
    ///
    /// A new property starts `BAKED` so the first frame resets it.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            value: DoubleBuffered::new(initial),
            base_value: initial,
            dirty_flags: BAKED_FLAG,
        }
    }

    /// Returns the value in slot `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: BufferIndex) -> T {
        self.value[index]
    }

    /// Returns the base value.
    #[inline]
    #[must_use]
    pub fn base_value(&self) -> T {
        self.base_value
    }

    /// Returns the raw dirty flags.
    #[inline]
    #[must_use]
    pub fn dirty_flags(&self) -> u8 {
        self.dirty_flags
    }

    /// Writes slot `index` only; the base value is untouched.
    ///
    /// Only dirties the property if the value actually changed.
    pub fn set(&mut self, index: BufferIndex, value: T) {
        if self.value[index] != value {
            self.value[index] = value;
            self.dirty_flags = SET_FLAG;
        }
    }

    /// Adds `delta` to slot `index`.
    pub fn set_relative(&mut self, index: BufferIndex, delta: T) {
        let current = self.value[index];
        self.set(index, current.add_relative(delta));
    }

    /// Writes the base value and both slots.
    ///
    /// Compares against the base value, since the current slot may already
    /// hold a constrained or animated value equal to `value`.
    pub fn bake(&mut self, index: BufferIndex, value: T) {
        if self.base_value != value {
            self.base_value = value;
            self.value[index] = value;
            self.value[index.other()] = value;
            self.dirty_flags = BAKED_FLAG;
        }
    }

    /// Adds `delta` to slot `index` and bakes the result into the base value
    /// and both slots.
    pub fn bake_relative(&mut self, index: BufferIndex, delta: T) {
        let baked = self.value[index].add_relative(delta);
        self.value[index] = baked;
        self.value[index.other()] = baked;
        self.base_value = baked;
        self.dirty_flags = BAKED_FLAG;
    }
}

impl<T: AnimatableValue> PropertyBase for AnimatableProperty<T> {
    fn reset_to_base_value(&mut self, index: BufferIndex) {
        if self.dirty_flags != CLEAN_FLAG {
            self.value[index] = self.base_value;
            self.dirty_flags >>= 1;
        }
    }

    fn mark_as_dirty(&mut self) {
        self.dirty_flags = RESET_FLAG;
    }

    fn is_clean(&self) -> bool {
        self.dirty_flags == CLEAN_FLAG
    }
}

/// Mutable view of an [`AnimatableProperty`] of any value type.
///
/// Lets message handlers apply a [`PropertyValue`] without knowing the
/// property's concrete type.
#[derive(Debug)]
pub enum AnimatablePropertyMut<'a> {
    /// A `bool` property.
    Boolean(&'a mut AnimatableProperty<bool>),
    /// An `i32` property.
    Integer(&'a mut AnimatableProperty<i32>),
    /// An `f32` property.
    Float(&'a mut AnimatableProperty<f32>),
    /// A [`Vector2`] property.
    Vector2(&'a mut AnimatableProperty<Vector2>),
    /// A [`Vector3`] property.
    Vector3(&'a mut AnimatableProperty<Vector3>),
    /// A [`Vector4`] property.
    Vector4(&'a mut AnimatableProperty<Vector4>),
}

macro_rules! dispatch_mut {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            AnimatablePropertyMut::Boolean($p) => $body,
            AnimatablePropertyMut::Integer($p) => $body,
            AnimatablePropertyMut::Float($p) => $body,
            AnimatablePropertyMut::Vector2($p) => $body,
            AnimatablePropertyMut::Vector3($p) => $body,
            AnimatablePropertyMut::Vector4($p) => $body,
        }
    };
}

macro_rules! impl_from_property {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<&'a mut AnimatableProperty<$ty>> for AnimatablePropertyMut<'a> {
                #[inline]
                fn from(property: &'a mut AnimatableProperty<$ty>) -> Self {
                    Self::$variant(property)
                }
            }
        )*
    };
}

impl_from_property!(
    bool => Boolean,
    i32 => Integer,
    f32 => Float,
    Vector2 => Vector2,
    Vector3 => Vector3,
    Vector4 => Vector4,
);

fn typed<T: AnimatableValue>(value: PropertyValue) -> Result<T, Error> {
    T::from_value(value).ok_or(Error::TypeMismatch {
        expected: T::TYPE,
        actual: value.property_type(),
    })
}

impl<'a> AnimatablePropertyMut<'a> {
    /// The stored value type.
    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Integer(_) => PropertyType::Integer,
            Self::Float(_) => PropertyType::Float,
            Self::Vector2(_) => PropertyType::Vector2,
            Self::Vector3(_) => PropertyType::Vector3,
            Self::Vector4(_) => PropertyType::Vector4,
        }
    }

    /// Value in slot `index`.
    #[must_use]
    pub fn get(&self, index: BufferIndex) -> PropertyValue {
        dispatch_mut!(self, p => p.get(index).to_value())
    }

    /// Base value.
    #[must_use]
    pub fn base_value(&self) -> PropertyValue {
        dispatch_mut!(self, p => p.base_value().to_value())
    }

    /// See [`AnimatableProperty::set`].
    pub fn set(&mut self, index: BufferIndex, value: PropertyValue) -> Result<(), Error> {
        dispatch_mut!(self, p => {
            p.set(index, typed(value)?);
            Ok(())
        })
    }

    /// See [`AnimatableProperty::set_relative`].
    pub fn set_relative(&mut self, index: BufferIndex, delta: PropertyValue) -> Result<(), Error> {
        dispatch_mut!(self, p => {
            p.set_relative(index, typed(delta)?);
            Ok(())
        })
    }

    /// See [`AnimatableProperty::bake`].
    pub fn bake(&mut self, index: BufferIndex, value: PropertyValue) -> Result<(), Error> {
        dispatch_mut!(self, p => {
            p.bake(index, typed(value)?);
            Ok(())
        })
    }

    /// See [`AnimatableProperty::bake_relative`].
    pub fn bake_relative(&mut self, index: BufferIndex, delta: PropertyValue) -> Result<(), Error> {
        dispatch_mut!(self, p => {
            p.bake_relative(index, typed(delta)?);
            Ok(())
        })
    }

    /// The property as a reset target.
    pub fn as_base(&mut self) -> &mut dyn PropertyBase {
        dispatch_mut!(self, p => &mut **p)
    }

    /// Consumes the view, keeping the borrow of the property.
    pub fn into_base(self) -> &'a mut dyn PropertyBase {
        dispatch_mut!(self, p => p)
    }
}

/// A double-buffered value computed by the update pass from ancestors.
///
/// Unlike [`AnimatableProperty`] there is no base value: the update pass
/// writes the current slot every frame the inputs changed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InheritedProperty<T> {
    value: DoubleBuffered<T>,
    initialized: bool,
}

impl<T: Copy> InheritedProperty<T> {
    /// Creates an inherited value with both slots set to `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            value: DoubleBuffered::new(initial),
            initialized: false,
        }
    }

    /// Returns the value in slot `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: BufferIndex) -> T {
        self.value[index]
    }

    /// Writes slot `index`.
    pub fn set(&mut self, index: BufferIndex, value: T) {
        self.value[index] = value;
        self.initialized = true;
    }

    /// Whether the update pass has written this value at least once.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const B0: BufferIndex = BufferIndex::ZERO;
    const B1: BufferIndex = BufferIndex::ONE;

    #[test]
    fn new_property_needs_one_reset() {
        let mut p = AnimatableProperty::new(1.0_f32);
        assert!(!p.is_clean());
        p.reset_to_base_value(B0);
        assert!(p.is_clean());
    }

    #[test]
    fn set_needs_two_resets() {
        let mut p = AnimatableProperty::new(1.0_f32);
        p.reset_to_base_value(B0);
        p.set(B1, 5.0);
        assert_eq!(p.get(B1), 5.0);
        assert_eq!(p.get(B0), 1.0);

        p.reset_to_base_value(B0);
        assert!(!p.is_clean());
        p.reset_to_base_value(B1);
        assert!(p.is_clean());
        assert_eq!(p.get(B1), 1.0);
    }

    #[test]
    fn set_same_value_stays_clean() {
        let mut p = AnimatableProperty::new(Vector3::ONE);
        p.reset_to_base_value(B0);
        p.set(B0, Vector3::ONE);
        assert!(p.is_clean());
    }

    #[test]
    fn bake_writes_base_and_both_slots() {
        let mut p = AnimatableProperty::new(0_i32);
        p.bake(B0, 9);
        assert_eq!(p.base_value(), 9);
        assert_eq!(p.get(B0), 9);
        assert_eq!(p.get(B1), 9);
        assert_eq!(p.dirty_flags(), BAKED_FLAG);
    }

    #[test]
    fn bake_relative_accumulates_from_current_slot() {
        let mut p = AnimatableProperty::new(Vector2::new(1.0, 1.0));
        p.bake_relative(B0, Vector2::new(2.0, 3.0));
        assert_eq!(p.base_value(), Vector2::new(3.0, 4.0));
        assert_eq!(p.get(B1), Vector2::new(3.0, 4.0));
    }

    #[test]
    fn bake_relative_holds_after_one_reset() {
        let mut p = AnimatableProperty::new(0.0_f32);
        p.bake_relative(B1, 5.0);
        p.reset_to_base_value(B1);
        assert!(p.is_clean());
        assert_eq!(p.get(B0), 5.0);
        assert_eq!(p.get(B1), 5.0);
    }

    #[test]
    fn reset_restores_base_after_constraint_write() {
        let mut p = AnimatableProperty::new(2.0_f32);
        p.set(B0, 10.0);
        p.reset_to_base_value(B0);
        assert_eq!(p.get(B0), 2.0);
    }

    #[test]
    fn mark_as_dirty_forces_resets() {
        let mut p = AnimatableProperty::new(true);
        p.reset_to_base_value(B0);
        assert!(p.is_clean());
        p.mark_as_dirty();
        assert!(!p.is_clean());
        p.reset_to_base_value(B0);
        p.reset_to_base_value(B1);
        assert!(p.is_clean());
    }

    #[test]
    fn boolean_relative_is_or() {
        assert!(false.add_relative(true));
        assert!(!false.add_relative(false));
        assert!(true.add_relative(false));
    }

    #[test]
    fn dynamic_view_checks_types() {
        let mut p = AnimatableProperty::new(1.0_f32);
        let mut view = AnimatablePropertyMut::from(&mut p);
        assert_eq!(view.property_type(), PropertyType::Float);
        view.bake(B0, PropertyValue::Float(4.0)).expect("matching type");
        assert_eq!(view.get(B1), PropertyValue::Float(4.0));
        assert_eq!(
            view.set(B0, PropertyValue::Boolean(true)),
            Err(Error::TypeMismatch {
                expected: PropertyType::Float,
                actual: PropertyType::Boolean,
            })
        );
        view.set_relative(B0, PropertyValue::Float(1.0)).expect("matching type");
        assert_eq!(view.get(B0), PropertyValue::Float(5.0));
        assert_eq!(view.base_value(), PropertyValue::Float(4.0));
        assert!(!view.as_base().is_clean());
    }

    #[test]
    fn lanes_preserve_integers_bitwise() {
        let v = PropertyValue::Integer(-7);
        assert_eq!(PropertyValue::from_lanes(PropertyType::Integer, v.to_lanes()), v);
    }
}
