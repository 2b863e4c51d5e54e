//! Deterministic, replayable random stream.
//!
//! The stream is a 32-bit xorshift generator (shifts 13/17/5) seeded from a
//! string. The seed is folded into an `i32` with the 31-multiplier string
//! hash, running xorshift after every UTF-16 unit. The draw at index `n` uses
//! the `(n + 1)`-th xorshift output, so a `(seed, index)` pair always yields
//! the same value no matter how the lineage got there.
//!
//! Every draw goes through a [`Random`] handle, which bumps the stream's
//! persistent counter exactly once and attaches one [`RandomRecord`] to the
//! executing event. Parameter errors are raised before anything is touched.

use rand::seq::SliceRandom;
use rand::RngCore;
use saga_core::value::Value;
use saga_core::SagaError;
use saga_journal::record::RandomRecord;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Lowercase and uppercase ASCII letters.
pub const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// ASCII digits.
pub const NUMBERS: &str = "0123456789";
/// Digits and letters.
pub const ALPHANUMERIC: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Digits, letters, and common punctuation. The default for strings.
pub const EXPANDED: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!@#$%^&*()-_=+[]{};:,.?";

const RANGE_MIN: f64 = i32::MIN as f64;
/// Distance from the lowest to the highest raw draw. Integer draws scale by
/// this, so `i32::MAX` lands exactly on `max + 1` and is clamped back.
const RANGE_SPAN: f64 = i32::MAX as f64 - i32::MIN as f64;
/// Number of distinct raw draws. Decimal draws scale by this so the result
/// stays below 1 without clamping.
const RANGE_SIZE: f64 = RANGE_SPAN + 1.0;

// ---------------------------------------------------------------------------
// Core generator
// ---------------------------------------------------------------------------

#[inline]
fn xorshift(mut v: i32) -> i32 {
    v ^= v << 13;
    v ^= v >> 17;
    v ^= v << 5;
    v
}

/// Fold a seed string into the generator's starting state. Never zero.
pub fn seed_hash(seed: &str) -> i32 {
    let mut h: i32 = 0;
    for unit in seed.encode_utf16() {
        h = (h << 5).wrapping_sub(h).wrapping_add(i32::from(unit));
        h = xorshift(h);
    }
    if h == 0 {
        1
    } else {
        h
    }
}

/// Map a raw draw onto `[min, max]`.
///
/// The width is taken in `f64` so full-range bounds cannot overflow. Past
/// 2^53 the result loses precision but stays inside the bounds.
fn map_int(v: i32, min: i64, max: i64) -> i64 {
    let width = max as f64 - min as f64 + 1.0;
    let n = ((f64::from(v) - RANGE_MIN) / RANGE_SPAN * width + min as f64).floor() as i64;
    n.clamp(min, max)
}

/// Map a raw draw onto `[0, 1)`.
fn map_decimal(v: i32) -> f64 {
    (f64::from(v) - RANGE_MIN) / RANGE_SIZE
}

// ---------------------------------------------------------------------------
// RandomStream
// ---------------------------------------------------------------------------

/// The seeded stream of one lineage: seed, draw counter, and generator state.
///
/// Only the seed and the counter are persisted; the generator state is
/// always re-derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StreamPosition", into = "StreamPosition")]
pub struct RandomStream {
    seed: String,
    count: u64,
    state: i32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamPosition {
    seed: String,
    num_generations: u64,
}

impl From<StreamPosition> for RandomStream {
    fn from(p: StreamPosition) -> Self {
        let mut stream = RandomStream::new(p.seed);
        stream.rewind(p.num_generations);
        stream
    }
}

impl From<RandomStream> for StreamPosition {
    fn from(s: RandomStream) -> Self {
        StreamPosition {
            seed: s.seed,
            num_generations: s.count,
        }
    }
}

impl RandomStream {
    /// A fresh stream at draw index 0.
    pub fn new(seed: impl Into<String>) -> Self {
        let seed = seed.into();
        let state = seed_hash(&seed);
        Self {
            seed,
            count: 0,
            state,
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Number of draws made so far along the lineage.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Move the stream so the next draw has index `count`.
    pub fn rewind(&mut self, count: u64) {
        let mut state = seed_hash(&self.seed);
        for _ in 0..count {
            state = xorshift(state);
        }
        self.state = state;
        self.count = count;
    }

    /// Consume one draw, returning its index and raw value.
    fn advance(&mut self) -> (u64, i32) {
        self.state = xorshift(self.state);
        let index = self.count;
        self.count += 1;
        (index, self.state)
    }
}

// ---------------------------------------------------------------------------
// DrawRng
// ---------------------------------------------------------------------------

/// A throwaway generator continuing from a single draw, used where one draw
/// needs several raw values (strings, shuffles). Implements [`RngCore`] so
/// `rand`'s sequence helpers can drive it.
#[derive(Debug, Clone)]
pub struct DrawRng {
    state: i32,
}

impl DrawRng {
    fn starting_at(state: i32) -> Self {
        Self { state }
    }

    fn next_raw(&mut self) -> i32 {
        let v = self.state;
        self.state = xorshift(self.state);
        v
    }
}

impl RngCore for DrawRng {
    fn next_u32(&mut self) -> u32 {
        self.next_raw() as u32
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Random
// ---------------------------------------------------------------------------

/// Draw handle bound to the stream and the executing event's record list.
pub struct Random<'a> {
    stream: &'a mut RandomStream,
    records: &'a mut Vec<RandomRecord>,
}

impl<'a> Random<'a> {
    pub fn new(stream: &'a mut RandomStream, records: &'a mut Vec<RandomRecord>) -> Self {
        Self { stream, records }
    }

    fn draw(&mut self) -> (u64, i32) {
        self.stream.advance()
    }

    fn record(&mut self, id: u64, value: Value) {
        trace!(draw = id, value = ?value, "random draw");
        self.records.push(RandomRecord { id, value });
    }

    /// An integer in `[min, max]`.
    pub fn int(&mut self, min: i64, max: i64) -> Result<i64, SagaError> {
        if min > max {
            return Err(SagaError::invalid_operation(format!(
                "random int bounds are reversed: min {min} > max {max}"
            )));
        }
        let (id, v) = self.draw();
        let n = map_int(v, min, max);
        self.record(id, Value::Int(n));
        Ok(n)
    }

    /// A float in `[0, 1)`.
    pub fn decimal(&mut self) -> Result<f64, SagaError> {
        let (id, v) = self.draw();
        let d = map_decimal(v);
        self.record(id, Value::Float(d));
        Ok(d)
    }

    /// A fair coin.
    pub fn boolean(&mut self) -> Result<bool, SagaError> {
        let (id, v) = self.draw();
        let b = v > 0;
        self.record(id, Value::Bool(b));
        Ok(b)
    }

    /// A string of `len` characters from `charset` ([`EXPANDED`] if `None`).
    pub fn string(&mut self, len: usize, charset: Option<&str>) -> Result<String, SagaError> {
        if len == 0 {
            return Err(SagaError::invalid_operation("random string length must be positive"));
        }
        let chars: Vec<char> = charset.unwrap_or(EXPANDED).chars().collect();
        let mut distinct = chars.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 2 {
            return Err(SagaError::invalid_operation(
                "random string charset needs at least two distinct characters",
            ));
        }

        let (id, v) = self.draw();
        let mut rng = DrawRng::starting_at(v);
        let last = chars.len() as i64 - 1;
        let s: String = (0..len)
            .map(|_| chars[map_int(rng.next_raw(), 0, last) as usize])
            .collect();
        self.record(id, Value::Text(s.clone()));
        Ok(s)
    }

    /// One element of `items`. The record holds the element, or its index
    /// when the element is agent-valued.
    pub fn choice<T>(&mut self, items: &[T]) -> Result<T, SagaError>
    where
        T: Clone + Into<Value>,
    {
        if items.is_empty() {
            return Err(SagaError::invalid_operation("random choice from an empty sequence"));
        }
        let (id, v) = self.draw();
        let index = map_int(v, 0, items.len() as i64 - 1) as usize;
        let picked = items[index].clone();
        let value: Value = picked.clone().into();
        if value.contains_agent() {
            self.record(id, Value::Int(index as i64));
        } else {
            self.record(id, value);
        }
        Ok(picked)
    }

    /// Shuffle `items` in place. Records the permutation as source indices.
    pub fn shuffle<T: Clone>(&mut self, items: &mut [T]) -> Result<(), SagaError> {
        if items.is_empty() {
            return Err(SagaError::invalid_operation("random shuffle of an empty sequence"));
        }
        let (id, v) = self.draw();
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.shuffle(&mut DrawRng::starting_at(v));

        let original = items.to_vec();
        for (slot, &from) in order.iter().enumerate() {
            items[slot] = original[from].clone();
        }
        self.record(
            id,
            Value::List(order.iter().map(|&i| Value::Int(i as i64)).collect()),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::agent::AgentId;

    fn draws(seed: &str, n: usize, f: impl Fn(&mut Random<'_>) -> Value) -> (Vec<Value>, Vec<RandomRecord>) {
        let mut stream = RandomStream::new(seed);
        let mut records = Vec::new();
        let mut rng = Random::new(&mut stream, &mut records);
        let values = (0..n).map(|_| f(&mut rng)).collect();
        (values, records)
    }

    // -- 1. Generator ---------------------------------------------------------

    #[test]
    fn seed_hash_matches_reference() {
        assert_eq!(seed_hash("boop"), 1_180_387_035);
        assert_eq!(seed_hash(""), 1);
    }

    #[test]
    fn raw_outputs_match_reference() {
        let mut stream = RandomStream::new("boop");
        let raw: Vec<i32> = (0..3).map(|_| stream.advance().1).collect();
        assert_eq!(raw, vec![-24_771_845, -436_809_865, -1_088_545_253]);
    }

    #[test]
    fn boop_int_sequence() {
        let (values, records) = draws("boop", 5, |r| Value::Int(r.int(1, 5).unwrap()));
        let ints: Vec<i64> = values.iter().filter_map(Value::as_int).collect();
        assert_eq!(ints, vec![3, 2, 2, 3, 1]);
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn int_clamps_to_max() {
        assert_eq!(map_int(i32::MAX, 1, 5), 5);
        assert_eq!(map_int(i32::MIN, 1, 5), 1);
        assert_eq!(map_int(12345, 7, 7), 7);
    }

    #[test]
    fn int_handles_full_width_bounds() {
        for v in [i32::MIN, -1, 0, 1, i32::MAX] {
            assert!((0..=i64::MAX).contains(&map_int(v, 0, i64::MAX)));
            let n = map_int(v, i64::MIN, i64::MAX);
            assert!((i64::MIN..=i64::MAX).contains(&n));
        }
        assert_eq!(map_int(i32::MIN, i64::MIN, i64::MAX), i64::MIN);
        assert_eq!(map_int(i32::MAX, i64::MIN, i64::MAX), i64::MAX);
        assert_eq!(map_int(i32::MAX, -3, -3), -3);

        let (values, records) = draws("boop", 2, |r| Value::Int(r.int(i64::MIN, i64::MAX).unwrap()));
        assert_eq!(values.len(), 2);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn top_raw_draw_hits_both_upper_edges() {
        // Integers reach `max` from the top draw; decimals stay below 1.
        assert_eq!(map_int(i32::MAX, 0, 9), 9);
        assert_eq!(map_int(i32::MAX - 1, 0, 9), 9);
        assert!(map_decimal(i32::MAX) < 1.0);
        assert_eq!(RANGE_SIZE, 4_294_967_296.0);
    }

    #[test]
    fn rewind_reproduces_draws() {
        let mut stream = RandomStream::new("boop");
        for _ in 0..3 {
            stream.advance();
        }
        let fourth = stream.advance();
        stream.rewind(3);
        assert_eq!(stream.advance(), fourth);
    }

    #[test]
    fn stream_serializes_seed_and_count() {
        let mut stream = RandomStream::new("boop");
        stream.advance();
        stream.advance();
        let json = serde_json::to_value(&stream).unwrap();
        assert_eq!(json, serde_json::json!({ "seed": "boop", "numGenerations": 2 }));
        let back: RandomStream = serde_json::from_value(json).unwrap();
        assert_eq!(back, stream);
    }

    // -- 2. Draw kinds --------------------------------------------------------

    #[test]
    fn decimal_in_unit_interval() {
        let (values, _) = draws("boop", 3, |r| Value::Float(r.decimal().unwrap()));
        let first = values[0].as_float().unwrap();
        assert!((first - 0.494_232_355_384_156_1).abs() < 1e-12);
        assert!(map_decimal(i32::MAX) < 1.0);
        assert_eq!(map_decimal(i32::MIN), 0.0);
    }

    #[test]
    fn boolean_is_sign_of_draw() {
        let (values, _) = draws("boop", 8, |r| Value::Bool(r.boolean().unwrap()));
        let bools: Vec<bool> = values.iter().filter_map(Value::as_bool).collect();
        assert_eq!(bools, vec![false, false, false, false, false, false, false, true]);
    }

    #[test]
    fn string_counts_as_one_draw() {
        let mut stream = RandomStream::new("boop");
        let mut records = Vec::new();
        let s = Random::new(&mut stream, &mut records).string(12, Some(NUMBERS)).unwrap();
        assert_eq!(s.len(), 12);
        assert!(s.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(stream.count(), 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, Value::Text(s));
    }

    #[test]
    fn choice_records_index_for_agents() {
        let agents = [AgentId(4), AgentId(5), AgentId(6)];
        let (values, records) = draws("boop", 1, |r| Value::from(r.choice(&agents).unwrap()));
        let picked = values[0].as_agent().unwrap();
        let index = agents.iter().position(|a| *a == picked).unwrap();
        assert_eq!(records[0].value, Value::Int(index as i64));

        let words = ["a", "b", "c"];
        let (values, records) = draws("boop", 1, |r| Value::from(r.choice(&words).unwrap()));
        assert_eq!(records[0].value, values[0]);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut stream = RandomStream::new("boop");
        let mut records = Vec::new();
        let mut items = vec![1, 2, 3, 4, 5, 6];
        Random::new(&mut stream, &mut records).shuffle(&mut items).unwrap();
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(stream.count(), 1);

        let mut again = vec![1, 2, 3, 4, 5, 6];
        let mut replay = RandomStream::new("boop");
        Random::new(&mut replay, &mut Vec::new()).shuffle(&mut again).unwrap();
        assert_eq!(again, items);
    }

    // -- 3. Errors have no side effects --------------------------------------

    #[test]
    fn invalid_parameters_leave_stream_untouched() {
        let mut stream = RandomStream::new("boop");
        let mut records = Vec::new();
        {
            let mut r = Random::new(&mut stream, &mut records);
            assert!(matches!(r.int(5, 1), Err(SagaError::InvalidOperation { .. })));
            assert!(r.string(0, None).is_err());
            assert!(r.string(4, Some("aaaa")).is_err());
            assert!(r.string(4, Some("")).is_err());
            assert!(r.choice::<i64>(&[]).is_err());
            assert!(r.shuffle::<i64>(&mut []).is_err());
        }
        assert_eq!(stream.count(), 0);
        assert!(records.is_empty());
    }

    #[test]
    fn same_seed_same_sequence() {
        let run = |seed: &str| {
            draws(seed, 20, |r| {
                Value::List(vec![
                    Value::Int(r.int(-100, 100).unwrap()),
                    Value::Float(r.decimal().unwrap()),
                    Value::Text(r.string(3, Some(ALPHABET)).unwrap()),
                    Value::Bool(r.boolean().unwrap()),
                ])
            })
            .0
        };
        assert_eq!(run("same"), run("same"));
        assert_ne!(run("same"), run("other"));
    }
}
