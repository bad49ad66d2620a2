//! Destructuring combinators for values.
//!
//! Test bodies spend most of their time taking generated s-expressions
//! apart. [`Value::matches`] unifies a value against a tuple of targets:
//! an empty tuple always matches, a single target matches the whole value,
//! and a longer tuple matches successive elements of a proper list. Targets
//! are either binders (`&mut T`, filled in on success) or literals
//! (compared for equality). A list shorter than the target tuple never
//! matches; extra trailing elements are ignored.

use crate::symbol::Symbol;
use crate::value::{Pair, Value};

/// One position in a match: binds or tests a single value.
pub trait Target {
    fn unify(&mut self, v: &Value) -> bool;
}

impl Target for &mut Value {
    fn unify(&mut self, v: &Value) -> bool {
        **self = v.clone();
        true
    }
}

impl Target for &mut Symbol {
    fn unify(&mut self, v: &Value) -> bool {
        match v.as_sym() {
            Some(s) => {
                **self = s.clone();
                true
            }
            None => false,
        }
    }
}

impl Target for &mut bool {
    fn unify(&mut self, v: &Value) -> bool {
        match v.as_bool() {
            Some(b) => {
                **self = b;
                true
            }
            None => false,
        }
    }
}

impl Target for &mut i64 {
    fn unify(&mut self, v: &Value) -> bool {
        match v.as_int64() {
            Some(i) => {
                **self = i;
                true
            }
            None => false,
        }
    }
}

impl Target for &mut Vec<u8> {
    fn unify(&mut self, v: &Value) -> bool {
        match v.as_blob() {
            Some(bytes) => {
                **self = bytes.to_vec();
                true
            }
            None => false,
        }
    }
}

impl Target for &mut String {
    fn unify(&mut self, v: &Value) -> bool {
        match v.as_str() {
            Some(s) => {
                **self = s.to_string();
                true
            }
            None => false,
        }
    }
}

impl Target for Symbol {
    fn unify(&mut self, v: &Value) -> bool {
        v.as_sym() == Some(&*self)
    }
}

impl Target for &Symbol {
    fn unify(&mut self, v: &Value) -> bool {
        v.as_sym() == Some(*self)
    }
}

impl Target for bool {
    fn unify(&mut self, v: &Value) -> bool {
        v.as_bool() == Some(*self)
    }
}

impl Target for i64 {
    fn unify(&mut self, v: &Value) -> bool {
        v.as_int64() == Some(*self)
    }
}

impl Target for &str {
    fn unify(&mut self, v: &Value) -> bool {
        v.as_str() == Some(*self)
    }
}

impl Target for &Value {
    fn unify(&mut self, v: &Value) -> bool {
        v == *self
    }
}

/// A tuple of targets matched against a value.
pub trait TargetList {
    fn unify_list(self, v: &Value) -> bool;
}

impl TargetList for () {
    fn unify_list(self, _v: &Value) -> bool {
        true
    }
}

impl<A: Target> TargetList for (A,) {
    fn unify_list(mut self, v: &Value) -> bool {
        self.0.unify(v)
    }
}

macro_rules! impl_target_list {
    ($($t:ident => $idx:tt),+) => {
        impl<$($t: Target),+> TargetList for ($($t,)+) {
            fn unify_list(mut self, v: &Value) -> bool {
                let Some(pair) = v.as_pair() else {
                    return false;
                };
                let mut cur: &Pair = pair.as_ref();
                let mut first = true;
                $(
                    if first {
                        first = false;
                    } else {
                        match cur.tail() {
                            Some(next) => cur = next.as_ref(),
                            None => return false,
                        }
                    }
                    if !self.$idx.unify(cur.head()) {
                        return false;
                    }
                )+
                true
            }
        }
    };
}

impl_target_list!(A => 0, B => 1);
impl_target_list!(A => 0, B => 1, C => 2);
impl_target_list!(A => 0, B => 1, C => 2, D => 3);
impl_target_list!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_target_list!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);
impl_target_list!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6);
impl_target_list!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6, H => 7);

impl Value {
    /// Unify this value with a tuple of targets. See the module docs for
    /// the matching rules.
    pub fn matches<T: TargetList>(&self, targets: T) -> bool {
        targets.unify_list(self)
    }
}
