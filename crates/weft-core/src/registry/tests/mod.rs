// Method registry test module
#[cfg(test)]
mod handle_tests;
#[cfg(test)]
mod style_tests;
