use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::hash::ItqProjections;
use crate::params::Parameter;
use crate::probe::{Prober, Progress};
use crate::stats::{mean_and_std, SignStats};
use crate::train;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fnv::FnvHashMap;
use log::debug;
use ndarray::Array2;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Lifecycle of an index. Operations are only legal in the states the
/// individual methods document; anything else is [Error::State].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Empty,
    Configured,
    Trained,
    Populated,
}

/// An index of `l` independent hash tables, each pairing a trained
/// projection basis with a bucket map from 64 bit code to the rows hashed
/// into it.
///
/// Lifecycle: [reset](ItqLsh::reset) -> [train_all](ItqLsh::train_all) ->
/// [hash](ItqLsh::hash) -> query or [dump](ItqLsh::dump).
/// [load](ItqLsh::load) restores a dumped index straight into the queryable
/// state. The learned projections are fixed after training; rows can still
/// be appended with [insert](ItqLsh::insert), but retraining requires a
/// fresh index.
pub struct ItqLsh {
    pub(crate) param: Parameter,
    /// One hasher per table, empty until trained.
    pub(crate) hashers: Vec<ItqProjections>,
    /// Per-table companion arrays of the serialized format. Never hashed.
    pub(crate) rnd: Vec<Vec<u32>>,
    /// Bucket id to member rows, in insertion order.
    pub(crate) tables: Vec<FnvHashMap<u64, Vec<u32>>>,
    stats: Option<SignStats>,
    state: State,
    seed: u64,
}

impl Default for ItqLsh {
    fn default() -> Self {
        ItqLsh::new()
    }
}

impl ItqLsh {
    /// Create an empty, unconfigured index.
    pub fn new() -> Self {
        ItqLsh {
            param: Parameter::default(),
            hashers: Vec::new(),
            rnd: Vec::new(),
            tables: Vec::new(),
            stats: None,
            state: State::Empty,
            seed: 0,
        }
    }

    /// Set the master seed. 0 (the default) seeds from ambient entropy; any
    /// other value makes training reproducible.
    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn param(&self) -> &Parameter {
        &self.param
    }

    fn expect_state(&self, allowed: &[State]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::State(format!(
                "operation not allowed in the {:?} state",
                self.state
            )))
        }
    }

    fn validate_vec(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.param.d {
            return Err(Error::Dataset(format!(
                "vector of dimension {} in an index of dimension {}",
                v.len(),
                self.param.d
            )));
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.param = Parameter::default();
        self.hashers = Vec::new();
        self.rnd = Vec::new();
        self.tables = Vec::new();
        self.stats = None;
        self.state = State::Empty;
    }

    /// Configure the index. Discards any previous tables and bases.
    pub fn reset(&mut self, param: Parameter) -> Result<()> {
        param.validate()?;
        self.param = param;
        self.hashers = Vec::new();
        self.rnd = vec![Vec::new(); param.l];
        self.tables = vec![FnvHashMap::default(); param.l];
        self.stats = None;
        self.state = State::Configured;
        Ok(())
    }

    /// Train the projection bases of all tables from a sample of `data`.
    ///
    /// Workers run concurrently in sequential batches of `batch_size`.
    /// All-or-nothing: on any worker failure the index keeps no partial
    /// bases and stays in the configured state.
    pub fn train_all<D: Dataset>(&mut self, data: &D, batch_size: usize) -> Result<()> {
        self.expect_state(&[State::Configured])?;
        if data.is_empty() {
            return Err(Error::Dataset("cannot train on an empty dataset".to_string()));
        }
        if data.dim() != self.param.d {
            return Err(Error::Dataset(format!(
                "dataset of dimension {} in an index of dimension {}",
                data.dim(),
                self.param.d
            )));
        }
        let trained = train::train_all(data, &self.param, batch_size, self.seed)?;
        self.hashers = Vec::with_capacity(trained.len());
        self.rnd = Vec::with_capacity(trained.len());
        for t in trained {
            self.hashers.push(ItqProjections::new(t.basis));
            self.rnd.push(t.rnd);
        }
        self.state = State::Trained;
        Ok(())
    }

    /// Compute the sign-split projection statistics of table 0 over `data`.
    /// The result is not stored; pass it to [set_stats](ItqLsh::set_stats)
    /// to attach it.
    pub fn compute_stats<D: Dataset>(&self, data: &D) -> Result<SignStats> {
        self.expect_state(&[State::Trained, State::Populated])?;
        if data.dim() != self.param.d {
            return Err(Error::Dataset(format!(
                "dataset of dimension {} in an index of dimension {}",
                data.dim(),
                self.param.d
            )));
        }
        Ok(mean_and_std(&self.hashers[0], data))
    }

    pub fn set_stats(&mut self, stats: SignStats) {
        self.stats = Some(stats);
    }

    pub fn stats(&self) -> Option<&SignStats> {
        self.stats.as_ref()
    }

    /// Append `row` to the bucket of `v` in every table. Rows are not
    /// deduplicated; inserting the same row twice stores it twice.
    pub fn insert(&mut self, row: u32, v: &[f32]) -> Result<()> {
        self.expect_state(&[State::Trained, State::Populated])?;
        self.validate_vec(v)?;
        for (tbl, hasher) in self.tables.iter_mut().zip(&self.hashers) {
            let bid = hasher.bucket_id(v);
            tbl.entry(bid).or_insert_with(Vec::new).push(row);
        }
        self.state = State::Populated;
        Ok(())
    }

    /// Hash every dataset row into all tables, in row order.
    pub fn hash<D: Dataset>(&mut self, data: &D) -> Result<()> {
        self.hash_with_progress(data, &mut ())
    }

    /// Like [hash](ItqLsh::hash), ticking `progress` once per inserted row.
    pub fn hash_with_progress<D: Dataset, O: Progress>(
        &mut self,
        data: &D,
        progress: &mut O,
    ) -> Result<()> {
        self.expect_state(&[State::Trained])?;
        if data.is_empty() {
            return Err(Error::Dataset("cannot hash an empty dataset".to_string()));
        }
        if data.dim() != self.param.d {
            return Err(Error::Dataset(format!(
                "dataset of dimension {} in an index of dimension {}",
                data.dim(),
                self.param.d
            )));
        }
        if data.len() > u32::MAX as usize {
            return Err(Error::Dataset(
                "row indices are stored as 32 bit unsigned ints".to_string(),
            ));
        }
        for r in 0..data.len() {
            let v = data.row(r);
            for (tbl, hasher) in self.tables.iter_mut().zip(&self.hashers) {
                let bid = hasher.bucket_id(v);
                tbl.entry(bid).or_insert_with(Vec::new).push(r as u32);
            }
            progress.tick();
        }
        self.state = State::Populated;
        Ok(())
    }

    /// The bucket id of `v` in table `table`.
    pub fn bucket_id(&self, table: usize, v: &[f32]) -> Result<u64> {
        self.expect_state(&[State::Trained, State::Populated])?;
        self.validate_vec(v)?;
        let hasher = self.hashers.get(table).ok_or(Error::TableNotExist)?;
        Ok(hasher.bucket_id(v))
    }

    /// The bucket ids of `v` across all tables.
    pub fn bucket_ids(&self, v: &[f32]) -> Result<Vec<u64>> {
        self.expect_state(&[State::Trained, State::Populated])?;
        self.validate_vec(v)?;
        Ok(self.hashers.iter().map(|h| h.bucket_id(v)).collect())
    }

    /// Bucket ids for a batch of vectors, computed in parallel.
    pub fn bucket_ids_batch_par(&self, vs: &[Vec<f32>]) -> Result<Vec<Vec<u64>>> {
        vs.par_iter().map(|v| self.bucket_ids(v)).collect()
    }

    /// The trained hasher of `table`, for probers that need raw projections.
    pub fn projections(&self, table: usize) -> Result<&ItqProjections> {
        self.expect_state(&[State::Trained, State::Populated])?;
        self.hashers.get(table).ok_or(Error::TableNotExist)
    }

    /// The serialized-format companion array of `table`. It has no effect
    /// on hashing or lookup and is retained for format compatibility only.
    pub fn rnd_indices(&self, table: usize) -> Result<&[u32]> {
        self.expect_state(&[State::Trained, State::Populated])?;
        self.rnd
            .get(table)
            .map(|r| r.as_slice())
            .ok_or(Error::TableNotExist)
    }

    /// Forward every member of `(table, bucket)` to the prober, in
    /// insertion order. Returns the bucket size; 0 if the bucket does not
    /// exist.
    pub fn probe<P: Prober>(&self, table: usize, bucket: u64, prober: &mut P) -> Result<usize> {
        self.expect_state(&[State::Populated])?;
        let tbl = self.tables.get(table).ok_or(Error::TableNotExist)?;
        match tbl.get(&bucket) {
            None => Ok(0),
            Some(members) => {
                for &row in members {
                    prober.visit(row);
                }
                Ok(members.len())
            }
        }
    }

    /// Drive the prober until it has seen at least `quota` candidates or
    /// runs out of buckets. Returns the number of candidates forwarded by
    /// this call. The index neither caps the buckets visited nor
    /// deduplicates rows across them.
    pub fn query<P: Prober>(&self, prober: &mut P, quota: usize) -> Result<usize> {
        self.expect_state(&[State::Populated])?;
        let mut forwarded = 0;
        while prober.items_probed() < quota && prober.has_next_bucket() {
            let (table, bucket) = prober.next_bucket();
            forwarded += self.probe(table, bucket, prober)?;
        }
        Ok(forwarded)
    }

    /// Number of buckets in `table`.
    pub fn bucket_count(&self, table: usize) -> Result<usize> {
        self.expect_state(&[State::Trained, State::Populated])?;
        self.tables
            .get(table)
            .map(|t| t.len())
            .ok_or(Error::TableNotExist)
    }

    /// Size of the largest bucket in `table`; 0 for an empty table.
    pub fn max_bucket_size(&self, table: usize) -> Result<usize> {
        self.expect_state(&[State::Trained, State::Populated])?;
        self.tables
            .get(table)
            .map(|t| t.values().map(|b| b.len()).max().unwrap_or(0))
            .ok_or(Error::TableNotExist)
    }

    /// Total number of stored members in `table`.
    pub fn table_len(&self, table: usize) -> Result<usize> {
        self.expect_state(&[State::Trained, State::Populated])?;
        self.tables
            .get(table)
            .map(|t| t.values().map(|b| b.len()).sum())
            .ok_or(Error::TableNotExist)
    }

    /// Bucket statistics of the whole index.
    /// * average bucket length
    /// * bucket length standard deviation
    /// * minimal bucket length
    /// * maximum bucket length
    pub fn describe(&self) -> Result<String> {
        self.expect_state(&[State::Trained, State::Populated])?;
        let lengths: Vec<usize> = self
            .tables
            .iter()
            .flat_map(|t| t.values().map(|b| b.len()))
            .collect();

        let mut out = format!("No. of tables: {}\n", self.param.l);
        if lengths.is_empty() {
            out.push_str("No buckets.\n");
            return Ok(out);
        }
        let avg = lengths.iter().sum::<usize>() as f32 / lengths.len() as f32;
        let var = lengths
            .iter()
            .map(|&v| (avg - v as f32) * (avg - v as f32))
            .sum::<f32>()
            / lengths.len() as f32;
        out.push_str(&format!("No. of buckets: {}\n", lengths.len()));
        out.push_str("\nBucket lengths:\n");
        out.push_str(&format!("avg:\t{:?}\n", avg));
        out.push_str(&format!("std-dev:\t{:?}\n", var.sqrt()));
        out.push_str(&format!("min:\t{:?}\n", lengths.iter().min().unwrap_or(&0)));
        out.push_str(&format!("max:\t{:?}\n", lengths.iter().max().unwrap_or(&0)));
        Ok(out)
    }

    /// Serialize the index to `path` in the raw little-endian table format.
    pub fn dump<Q: AsRef<Path>>(&self, path: Q) -> Result<()> {
        self.expect_state(&[State::Populated])?;
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(f);
        self.write_to(&mut w)?;
        w.flush()?;
        debug!("dumped index to {}", path.as_ref().display());
        Ok(())
    }

    fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        for &v in &[
            self.param.m,
            self.param.l,
            self.param.d,
            self.param.n_bits,
            self.param.s,
        ] {
            w.write_u32::<LittleEndian>(v as u32)?;
        }
        for k in 0..self.param.l {
            for &r in &self.rnd[k] {
                w.write_u32::<LittleEndian>(r)?;
            }
            w.write_u32::<LittleEndian>(self.tables[k].len() as u32)?;
            for (bid, members) in &self.tables[k] {
                w.write_u64::<LittleEndian>(*bid)?;
                w.write_u32::<LittleEndian>(members.len() as u32)?;
                for &row in members {
                    w.write_u32::<LittleEndian>(row)?;
                }
            }
            for &x in self.hashers[k].basis().iter() {
                w.write_f32::<LittleEndian>(x)?;
            }
        }
        Ok(())
    }

    /// Deserialize an index from `path`, replacing the current state. On
    /// any failure the error is returned and the index is left empty.
    pub fn load<Q: AsRef<Path>>(&mut self, path: Q) -> Result<()> {
        self.clear();
        let f = File::open(path.as_ref())?;
        let mut r = BufReader::new(f);
        match self.read_from(&mut r) {
            Ok(()) => {
                self.state = State::Populated;
                debug!("loaded index from {}", path.as_ref().display());
                Ok(())
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    fn read_from<R: Read>(&mut self, r: &mut R) -> Result<()> {
        let m = r.read_u32::<LittleEndian>()? as usize;
        let l = r.read_u32::<LittleEndian>()? as usize;
        let d = r.read_u32::<LittleEndian>()? as usize;
        let n_bits = r.read_u32::<LittleEndian>()? as usize;
        let s = r.read_u32::<LittleEndian>()? as usize;
        // the iteration budget is not part of the format
        let param = Parameter {
            m,
            l,
            d,
            n_bits,
            s,
            i: 0,
        };
        param
            .validate()
            .map_err(|e| Error::Format(format!("bad header: {}", e)))?;

        let mut hashers = Vec::new();
        let mut rnd = Vec::new();
        let mut tables = Vec::new();
        for _ in 0..l {
            let mut table_rnd = Vec::with_capacity(n_bits);
            for _ in 0..n_bits {
                table_rnd.push(r.read_u32::<LittleEndian>()?);
            }
            rnd.push(table_rnd);

            let count = r.read_u32::<LittleEndian>()? as usize;
            // lengths come from the stream; grow the collections as reads
            // succeed instead of trusting the announced sizes
            let mut table = FnvHashMap::default();
            for _ in 0..count {
                let bid = r.read_u64::<LittleEndian>()?;
                if n_bits < 64 && bid >> n_bits != 0 {
                    return Err(Error::Format(format!(
                        "bucket id {:#x} does not fit in {} bits",
                        bid, n_bits
                    )));
                }
                let len = r.read_u32::<LittleEndian>()? as usize;
                let mut members = Vec::new();
                for _ in 0..len {
                    members.push(r.read_u32::<LittleEndian>()?);
                }
                if table.insert(bid, members).is_some() {
                    return Err(Error::Format(format!("duplicate bucket id {:#x}", bid)));
                }
            }
            tables.push(table);

            let mut basis = Vec::new();
            for _ in 0..n_bits * d {
                basis.push(r.read_f32::<LittleEndian>()?);
            }
            let basis = Array2::from_shape_vec((n_bits, d), basis)
                .map_err(|e| Error::Format(e.to_string()))?;
            hashers.push(ItqProjections::new(basis));
        }

        self.param = param;
        self.hashers = hashers;
        self.rnd = rnd;
        self.tables = tables;
        Ok(())
    }
}
