//! Applying compiled filters to record collections.
//!
//! A [`Filter`] is compiled once per clause and then evaluated against each
//! record independently. Filtering keeps input order. Mark mode reports one
//! boolean per record instead of building a second collection.

use crate::query::{
    CompileError, EvalError, Expression, NoFields, compile, evaluate_predicate,
};
use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Where a record keeps its attribute fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FieldAccess {
    /// `{ "name": .. }`
    #[default]
    Flat,
    /// `{ "attributes": { "name": .. } }`
    Attributes,
    /// `{ "properties": { "name": .. } }`, as in GeoJSON features
    Properties,
}

type Resolver = fn(&JsonValue) -> Option<&Map<String, JsonValue>>;

fn flat_fields(record: &JsonValue) -> Option<&Map<String, JsonValue>> {
    record.as_object()
}

fn attribute_fields(record: &JsonValue) -> Option<&Map<String, JsonValue>> {
    record.get("attributes")?.as_object()
}

fn property_fields(record: &JsonValue) -> Option<&Map<String, JsonValue>> {
    record.get("properties")?.as_object()
}

impl FieldAccess {
    /// Name of the nested object holding fields, if any.
    pub fn container(self) -> Option<&'static str> {
        match self {
            FieldAccess::Flat => None,
            FieldAccess::Attributes => Some("attributes"),
            FieldAccess::Properties => Some("properties"),
        }
    }

    fn resolver(self) -> Resolver {
        match self {
            FieldAccess::Flat => flat_fields,
            FieldAccess::Attributes => attribute_fields,
            FieldAccess::Properties => property_fields,
        }
    }
}

/// A record whose evaluation failed. The record counts as not matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub index: usize,
    pub error: EvalError,
}

/// Matching records in input order.
#[derive(Debug)]
pub struct Filtered<'r> {
    pub records: Vec<&'r JsonValue>,
    pub mismatches: Vec<Mismatch>,
}

/// One flag per input record, in input order.
#[derive(Debug)]
pub struct Marked {
    pub flags: Vec<bool>,
    pub mismatches: Vec<Mismatch>,
}

/// A compiled `WHERE` clause bound to a field-access mode.
#[derive(Debug, Clone)]
pub struct Filter {
    clause: String,
    expr: Expression,
    access: FieldAccess,
}

impl Filter {
    pub fn compile(clause: &str, access: FieldAccess) -> Result<Self, CompileError> {
        let expr = compile(clause)?;
        tracing::debug!("Filter: compiled '{}' as {}", clause, expr);
        Ok(Filter {
            clause: clause.to_string(),
            expr,
            access,
        })
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    pub fn access(&self) -> FieldAccess {
        self.access
    }

    /// The same predicate reading fields through another access mode.
    pub fn with_access(&self, access: FieldAccess) -> Filter {
        Filter {
            clause: self.clause.clone(),
            expr: self.expr.clone(),
            access,
        }
    }

    /// Test a single record.
    pub fn evaluate(&self, record: &JsonValue) -> Result<bool, EvalError> {
        self.test(self.access.resolver(), record)
    }

    fn test(&self, resolve: Resolver, record: &JsonValue) -> Result<bool, EvalError> {
        match resolve(record) {
            Some(fields) => evaluate_predicate(&self.expr, fields),
            None => evaluate_predicate(&self.expr, &NoFields),
        }
    }

    /// Turn one evaluation result into a flag, recording any mismatch.
    fn settle(
        &self,
        index: usize,
        result: Result<bool, EvalError>,
        mismatches: &mut Vec<Mismatch>,
    ) -> bool {
        match result {
            Ok(matched) => matched,
            Err(error) => {
                tracing::debug!("Filter: record {} skipped: {}", index, error);
                mismatches.push(Mismatch { index, error });
                false
            }
        }
    }

    fn report(&self, total: usize, mismatches: &[Mismatch]) {
        if !mismatches.is_empty() {
            tracing::warn!(
                "Filter: {} of {} records could not be evaluated against '{}'",
                mismatches.len(),
                total,
                self.clause
            );
        }
    }

    fn collect<'r, I>(&self, records: &'r [JsonValue], results: I) -> Filtered<'r>
    where
        I: IntoIterator<Item = Result<bool, EvalError>>,
    {
        let mut matched = Vec::new();
        let mut mismatches = Vec::new();
        for (index, (record, result)) in records.iter().zip(results).enumerate() {
            if self.settle(index, result, &mut mismatches) {
                matched.push(record);
            }
        }
        self.report(records.len(), &mismatches);
        Filtered {
            records: matched,
            mismatches,
        }
    }

    /// Keep the records the clause matches.
    pub fn apply<'r>(&self, records: &'r [JsonValue]) -> Filtered<'r> {
        let resolve = self.access.resolver();
        self.collect(records, records.iter().map(|record| self.test(resolve, record)))
    }

    /// Parallel [`Filter::apply`]. Output order still follows input order.
    pub fn par_apply<'r>(&self, records: &'r [JsonValue]) -> Filtered<'r> {
        let resolve = self.access.resolver();
        let results: Vec<Result<bool, EvalError>> = records
            .par_iter()
            .map(|record| self.test(resolve, record))
            .collect();
        self.collect(records, results)
    }

    /// Call `on_record` with every record and whether it matched.
    pub fn mark<F>(&self, records: &[JsonValue], mut on_record: F) -> Vec<Mismatch>
    where
        F: FnMut(&JsonValue, bool),
    {
        let resolve = self.access.resolver();
        let mut mismatches = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let matched = self.settle(index, self.test(resolve, record), &mut mismatches);
            on_record(record, matched);
        }
        self.report(records.len(), &mismatches);
        mismatches
    }

    /// [`Filter::mark`] over mutable records, for toggling state in place.
    pub fn mark_mut<F>(&self, records: &mut [JsonValue], mut on_record: F) -> Vec<Mismatch>
    where
        F: FnMut(&mut JsonValue, bool),
    {
        let resolve = self.access.resolver();
        let mut mismatches = Vec::new();
        for (index, record) in records.iter_mut().enumerate() {
            let matched = self.settle(index, self.test(resolve, record), &mut mismatches);
            on_record(record, matched);
        }
        self.report(records.len(), &mismatches);
        mismatches
    }

    /// Parallel mark mode returning the flags.
    pub fn par_mark(&self, records: &[JsonValue]) -> Marked {
        let resolve = self.access.resolver();
        let results: Vec<Result<bool, EvalError>> = records
            .par_iter()
            .map(|record| self.test(resolve, record))
            .collect();

        let mut mismatches = Vec::new();
        let flags = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| self.settle(index, result, &mut mismatches))
            .collect();
        self.report(records.len(), &mismatches);
        Marked { flags, mismatches }
    }
}
