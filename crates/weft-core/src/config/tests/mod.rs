// Configuration test module
#[cfg(test)]
mod reference_tests;
#[cfg(test)]
mod service_tests;
