//! # Location Interning and Sample Merging
//!
//! Builds a [`Profile`] from decoded stack records:
//!
//! - every distinct raw address becomes one [`Location`], numbered from 1 in
//!   first-seen order and attributed to the mapping that contains it;
//! - every stack becomes a sequence of location identities;
//! - stacks with the identical sequence share one [`Sample`] whose values
//!   `[count, count * period]` are summed.
//!
//! The builder owns all of its lookup state, so independent conversions
//! never share anything.

use log::{debug, info};
use std::collections::HashMap;

use crate::decoder::Decoder;
use crate::domain::{FormatError, LocationId};
use crate::profile::{accumulate, Location, Profile, Sample};
use crate::symbolization::MappingTable;

/// Stream periods are microseconds; profile periods are nanoseconds.
const NANOS_PER_MICRO: i64 = 1000;

pub struct ProfileBuilder<'m> {
    profile: Profile,
    mappings: &'m MappingTable,
    locations_by_address: HashMap<u64, LocationId>,
    samples_by_stack: HashMap<Vec<LocationId>, usize>,
    records: usize,
}

impl<'m> ProfileBuilder<'m> {
    #[must_use]
    pub fn new(mappings: &'m MappingTable) -> Self {
        Self {
            profile: Profile::cpu(0),
            mappings,
            locations_by_address: HashMap::new(),
            samples_by_stack: HashMap::new(),
            records: 0,
        }
    }

    /// Set the sampling period from the stream header.
    ///
    /// # Errors
    /// Returns [`FormatError::ValueOverflow`] if the period in nanoseconds
    /// does not fit the profile's value range.
    pub fn set_period(&mut self, period_us: u64) -> Result<(), FormatError> {
        self.profile.period = i64::try_from(period_us)
            .ok()
            .and_then(|p| p.checked_mul(NANOS_PER_MICRO))
            .ok_or(FormatError::ValueOverflow { what: "period", value: period_us })?;
        Ok(())
    }

    /// Record `count` occurrences of a stack (innermost address first).
    ///
    /// # Errors
    /// Returns [`FormatError::ValueOverflow`] if `count` or `count * period`
    /// does not fit the profile's value range.
    pub fn add_stack(&mut self, count: u64, addresses: &[u64]) -> Result<(), FormatError> {
        let samples = i64::try_from(count)
            .map_err(|_| FormatError::ValueOverflow { what: "sample count", value: count })?;
        let cpu = samples
            .checked_mul(self.profile.period)
            .ok_or(FormatError::ValueOverflow { what: "sample count", value: count })?;

        let stack: Vec<LocationId> = addresses
            .iter()
            .enumerate()
            .map(|(depth, &addr)| self.location_for(addr, depth > 0))
            .collect();

        self.add_sample(stack, &[samples, cpu])
            .ok_or(FormatError::ValueOverflow { what: "merged sample", value: count })?;
        self.records += 1;
        Ok(())
    }

    /// Location for `addr`, created on first sight.
    ///
    /// `caller` marks an address seen below the innermost frame, i.e. a
    /// return address.
    pub fn location_for(&mut self, addr: u64, caller: bool) -> LocationId {
        if let Some(&id) = self.locations_by_address.get(&addr) {
            if caller {
                if let Some(location) = id.index().and_then(|i| self.profile.locations.get_mut(i)) {
                    location.return_address = true;
                }
            }
            return id;
        }

        let id = LocationId::from_index(self.profile.locations.len());
        let mapping = self.mappings.find(addr).map(|m| m.id);
        debug!("New location {id} at 0x{addr:x} (mapping: {mapping:?})");

        self.profile.locations.push(Location {
            id,
            address: addr,
            mapping,
            lines: Vec::new(),
            return_address: caller,
        });
        self.locations_by_address.insert(addr, id);
        id
    }

    /// `None` if merging into an existing sample overflows its values.
    fn add_sample(&mut self, stack: Vec<LocationId>, values: &[i64]) -> Option<()> {
        if let Some(&index) = self.samples_by_stack.get(&stack) {
            return accumulate(&mut self.profile.samples[index].values, values);
        }

        self.samples_by_stack.insert(stack.clone(), self.profile.samples.len());
        self.profile.samples.push(Sample { locations: stack, values: values.to_vec() });
        Some(())
    }

    /// Finish the profile, copying the mapping table into it.
    #[must_use]
    pub fn finish(mut self) -> Profile {
        self.profile.mappings = self.mappings.mappings().to_vec();
        info!(
            "Built profile: {} records, {} samples, {} locations, period {}ns",
            self.records,
            self.profile.samples.len(),
            self.profile.locations.len(),
            self.profile.period
        );
        self.profile
    }
}

/// Decode a raw word stream and build its (unsymbolized) profile.
///
/// # Errors
/// Returns the first [`FormatError`]; no partial profile is produced.
pub fn build_profile(words: &[u64], mappings: &MappingTable) -> Result<Profile, FormatError> {
    let decoder = Decoder::new(words)?;
    let mut builder = ProfileBuilder::new(mappings);
    builder.set_period(decoder.period())?;

    for record in decoder {
        let record = record?;
        builder.add_stack(record.count, record.addresses)?;
    }

    Ok(builder.finish())
}
