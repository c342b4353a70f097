/// Construction policy flags of a registration
/// ## Fields
/// - `cache_provides`:
///   If `true`, the built instance is stored in the innermost active scope and reused
///   by later requests that can see that scope.
///
///   This does **not** affect the dependencies of the instance,
///   each of them is cached according to its own registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub cache_provides: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { cache_provides: true }
    }
}

impl Config {
    #[inline]
    #[must_use]
    pub const fn transient() -> Self {
        Self { cache_provides: false }
    }
}
