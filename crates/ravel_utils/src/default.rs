/// An ergonomic abbreviation for [`Default::default()`] to make initializing structs easier.
///
/// # Example
///
/// ```
/// use ravel_utils::default;
///
/// #[derive(Default)]
/// struct Settings {
///   depth: usize,
///   strict: bool,
/// }
///
/// let settings = Settings {
///   strict: true,
///   ..default()
/// };
/// # assert_eq!(settings.depth, 0);
/// ```
#[inline(always)]
pub fn default<T: Default>() -> T {
    T::default()
}
