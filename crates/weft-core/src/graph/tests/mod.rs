// Dependency graph test module
#[cfg(test)]
mod export_tests;
#[cfg(test)]
mod graph_tests;
#[cfg(test)]
mod plan_tests;
