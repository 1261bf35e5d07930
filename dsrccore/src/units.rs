use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Div, Mul, Neg, Sub},
};

use serde::{Deserialize, Serialize};

pub trait Unit: Into<f64> {
    fn inner(self) -> f64 {
        self.into()
    }
}

macro_rules! Quantity {
    ($name: ident) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(f64);

        impl From<f64> for $name {
            fn from(value: f64) -> Self {
                $name(value)
            }
        }

        impl From<$name> for f64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Unit for $name {}

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl Add for $name {
            type Output = $name;

            fn add(self, rhs: Self) -> Self::Output {
                $name(self.0 + rhs.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold($name(0.0), |a, b| a + b)
            }
        }

        impl Sub for $name {
            type Output = $name;

            fn sub(self, rhs: Self) -> Self::Output {
                $name(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = $name;

            fn neg(self) -> Self::Output {
                $name(-self.0)
            }
        }

        impl Div for $name {
            type Output = f64;

            fn div(self, rhs: Self) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl Div<f64> for $name {
            type Output = $name;

            fn div(self, rhs: f64) -> Self::Output {
                $name(self.0 / rhs)
            }
        }

        impl Mul<f64> for $name {
            type Output = $name;

            fn mul(self, rhs: f64) -> Self::Output {
                $name(self.0 * rhs)
            }
        }

        impl Mul<$name> for f64 {
            type Output = $name;

            fn mul(self, rhs: $name) -> Self::Output {
                $name(self * rhs.0)
            }
        }

        impl $name {
            pub const ZERO: $name = $name(0.0);

            #[inline]
            pub fn map<F>(self, f: F) -> Self
            where
                F: FnOnce(f64) -> f64,
            {
                Self(f(self.0))
            }

            /// Same as calling powi on the underlying float.
            /// Strictly this should change the unit but doesn't.
            pub fn powi(self, exp: i32) -> Self {
                Self(self.0.powi(exp))
            }

            /// Strictly this should change the unit but doesn't.
            pub fn sqrt(self) -> Self {
                Self(self.0.sqrt())
            }

            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }
    };
}

macro_rules! MulRelation {
    ($left: ident, $right: ident, $result: ident) => {
        impl Mul<$right> for $left {
            type Output = $result;

            fn mul(self, rhs: $right) -> Self::Output {
                $result(self.0 * rhs.0)
            }
        }

        impl Mul<$left> for $right {
            type Output = $result;

            fn mul(self, rhs: $left) -> Self::Output {
                $result(self.0 * rhs.0)
            }
        }

        impl Div<$right> for $result {
            type Output = $left;

            fn div(self, rhs: $right) -> Self::Output {
                $left(self.0 / rhs.0)
            }
        }
    };
}

Quantity!(Length);
pub const METRES: Length = Length::from_metres(1.0);
pub const KM: Length = Length::from_metres(1000.0);
impl Length {
    pub const fn from_metres(n: f64) -> Self {
        Length(n)
    }

    pub fn metres(self) -> f64 {
        self.0
    }
}

Quantity!(Time);
pub const MINS: Time = Time::from_seconds(60.0);
pub const SECONDS: Time = Time::from_seconds(1.0);
impl Time {
    pub const fn from_seconds(n: f64) -> Self {
        Time(n)
    }

    pub const fn from_milis(n: f64) -> Self {
        Time(n / 1000.0)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn milis(self) -> f64 {
        self.0 * 1000.0
    }
}

Quantity!(Speed);

/// Metres per second
pub const MPS: Speed = Speed::from_metres_per_second(1.0);

impl Speed {
    pub const fn from_metres_per_second(n: f64) -> Self {
        Speed(n)
    }
}

MulRelation!(Speed, Time, Length);
