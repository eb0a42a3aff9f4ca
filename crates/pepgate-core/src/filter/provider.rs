//! Built-in providers backed by the content filter.

use serde_json::Value;

use crate::constraint::{Constraint, ConstraintKind};
use crate::constraints::handler::Mapper;
use crate::constraints::provider::{
    FilterPredicateConstraintHandlerProvider, MappingConstraintHandlerProvider, Responsible,
};
use crate::error::Result;
use crate::predicate::Predicate;

/// Claims `jsonContentFilterPredicate` constraints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentFilterPredicateProvider;

impl Responsible for ContentFilterPredicateProvider {
    fn is_responsible(&self, constraint: &Constraint) -> bool {
        constraint.kind() == ConstraintKind::JsonContentFilterPredicate
    }
}

impl FilterPredicateConstraintHandlerProvider for ContentFilterPredicateProvider {
    fn get_handler(&self, constraint: &Constraint) -> Result<Predicate<Value>> {
        super::predicate_from_conditions(constraint)
    }
}

/// Claims `filterJsonContent` constraints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentFilteringProvider;

impl Responsible for ContentFilteringProvider {
    fn is_responsible(&self, constraint: &Constraint) -> bool {
        constraint.kind() == ConstraintKind::FilterJsonContent
    }
}

impl MappingConstraintHandlerProvider for ContentFilteringProvider {
    fn get_handler(&self, constraint: &Constraint) -> Result<Mapper<Value>> {
        super::get_handler(constraint)
    }
}
