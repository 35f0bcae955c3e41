pub mod apriori;
pub mod discretize;
pub mod rules;
