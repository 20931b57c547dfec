//! Canonical encoding used as hash input.
//!
//! Records are lowered to a `serde_json::Value` whose object keys are
//! inserted from a `BTreeMap`, so they come out sorted whatever order the
//! fields are declared in. The value is then printed as compact JSON.
//! Numbers use serde_json's shortest round-trip formatting, which does not
//! depend on locale or platform.
use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::{Block, Transaction};

pub trait Canonical {
    fn canonical_value(&self) -> Value;

    fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_value().to_string().into_bytes()
    }
}

fn sorted_object(fields: BTreeMap<&'static str, Value>) -> Value {
    Value::Object(
        fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

impl Canonical for Transaction {
    fn canonical_value(&self) -> Value {
        sorted_object(BTreeMap::from([
            ("sender", json!(self.sender)),
            ("receiver", json!(self.receiver)),
            ("amount", json!(self.amount)),
            ("product_id", json!(self.product_id)),
            ("type", json!(self.kind)),
        ]))
    }
}

impl Canonical for Block {
    fn canonical_value(&self) -> Value {
        let transactions: Vec<Value> = self
            .transactions
            .iter()
            .map(Canonical::canonical_value)
            .collect();
        sorted_object(BTreeMap::from([
            ("index", json!(self.index)),
            ("timestamp", json!(self.timestamp)),
            ("transactions", Value::Array(transactions)),
            ("proof", json!(self.proof)),
            ("previous_hash", json!(self.previous_hash)),
        ]))
    }
}
