/*!
 * Copyright (c) 2016 Microsoft Corporation. All rights reserved.
 * Licensed under the MIT License. See LICENSE file in the project root for license information.
 */

//! # Collective communication for distributed loading
//!
//! The loader needs exactly one collective primitive: an all-gather of
//! variable-sized blocks. A [`Network`] handle carries this machine's rank,
//! the machine count, and the back end that moves the bytes:
//!
//! - single machine (the gather is a copy),
//! - an external all-gather function supplied by the embedding application,
//! - an in-process cluster whose ranks are threads of the same process
//!   ([`LocalCluster`]), used to run multi-machine loads in tests.
//!
//! The call is blocking and all-or-nothing. A failing rank fails the step on
//! every rank; there is no timeout or retry.

use crate::core::error::{LightGBMError, Result};
use crate::core::types::CommSize;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

/// External all-gather implementation.
///
/// Arguments are the local block, the per-rank block starts, the per-rank
/// block lengths and the total output size. Must return the concatenation of
/// every rank's block.
pub type AllgatherFunction =
    Arc<dyn Fn(&[u8], &[CommSize], &[CommSize], CommSize) -> Result<Vec<u8>> + Send + Sync>;

#[derive(Clone)]
enum Backend {
    Local,
    External(AllgatherFunction),
    InProcess(Arc<InProcessHub>),
}

/// Handle to the collective network of one machine.
#[derive(Clone)]
pub struct Network {
    rank: usize,
    num_machines: usize,
    backend: Backend,
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self.backend {
            Backend::Local => "local",
            Backend::External(_) => "external",
            Backend::InProcess(_) => "in_process",
        };
        f.debug_struct("Network")
            .field("rank", &self.rank)
            .field("num_machines", &self.num_machines)
            .field("backend", &backend)
            .finish()
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::single_machine()
    }
}

impl Network {
    /// Network of a job that runs on one machine.
    pub fn single_machine() -> Self {
        Network {
            rank: 0,
            num_machines: 1,
            backend: Backend::Local,
        }
    }

    /// Initialize with an external all-gather implementation.
    pub fn with_allgather(
        rank: usize,
        num_machines: usize,
        allgather_ext_fun: AllgatherFunction,
    ) -> Result<Self> {
        if num_machines == 0 || rank >= num_machines {
            return Err(LightGBMError::invalid_parameter(
                "rank",
                rank.to_string(),
                format!("must be in [0, {})", num_machines),
            ));
        }
        log::info!(
            "Network initialized: rank={}, num_machines={}",
            rank,
            num_machines
        );
        Ok(Network {
            rank,
            num_machines,
            backend: Backend::External(allgather_ext_fun),
        })
    }

    /// Rank of this machine
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total number of machines
    pub fn num_machines(&self) -> usize {
        self.num_machines
    }

    /// Performing all_gather of blocks of different sizes.
    ///
    /// `input` is this machine's block and must be exactly
    /// `block_len[rank]` bytes long. The result holds every machine's block
    /// at its `block_start`, `all_size` bytes in total.
    pub fn allgather(
        &self,
        input: &[u8],
        block_start: &[CommSize],
        block_len: &[CommSize],
        all_size: CommSize,
    ) -> Result<Vec<u8>> {
        check_block_layout(self.num_machines, block_start, block_len, all_size)?;
        if input.len() != block_len[self.rank] {
            return Err(LightGBMError::network(format!(
                "Rank {} contributes {} bytes but its block length is {}",
                self.rank,
                input.len(),
                block_len[self.rank]
            )));
        }

        let output = match &self.backend {
            Backend::Local => input.to_vec(),
            Backend::External(ext_fun) => ext_fun(input, block_start, block_len, all_size)?,
            Backend::InProcess(hub) => hub.allgather(self.rank, input, block_start, block_len, all_size)?,
        };

        if output.len() != all_size {
            return Err(LightGBMError::network(format!(
                "All-gather returned {} bytes, expected {}",
                output.len(),
                all_size
            )));
        }
        Ok(output)
    }
}

fn check_block_layout(
    num_machines: usize,
    block_start: &[CommSize],
    block_len: &[CommSize],
    all_size: CommSize,
) -> Result<()> {
    if block_start.len() != num_machines || block_len.len() != num_machines {
        return Err(LightGBMError::network(format!(
            "Block layout describes {} starts and {} lengths for {} machines",
            block_start.len(),
            block_len.len(),
            num_machines
        )));
    }
    let mut expected_start = 0;
    for (&start, &len) in block_start.iter().zip(block_len) {
        if start != expected_start {
            return Err(LightGBMError::network(format!(
                "Block starts at {} but previous blocks end at {}",
                start, expected_start
            )));
        }
        expected_start += len;
    }
    if expected_start != all_size {
        return Err(LightGBMError::network(format!(
            "Blocks cover {} bytes but the output size is {}",
            expected_start, all_size
        )));
    }
    Ok(())
}

/// A group of in-process ranks that rendezvous on a shared hub.
///
/// Each rank's [`Network`] must be driven from its own thread; a collective
/// call blocks until every rank of the cluster has joined it.
#[derive(Debug)]
pub struct LocalCluster;

impl LocalCluster {
    /// Create `num_machines` connected network handles, indexed by rank.
    pub fn create(num_machines: usize) -> Result<Vec<Network>> {
        if num_machines == 0 {
            return Err(LightGBMError::invalid_parameter(
                "num_machines",
                "0",
                "must be at least 1",
            ));
        }
        let hub = Arc::new(InProcessHub::new(num_machines));
        Ok((0..num_machines)
            .map(|rank| Network {
                rank,
                num_machines,
                backend: Backend::InProcess(Arc::clone(&hub)),
            })
            .collect())
    }
}

#[derive(Debug)]
struct HubState {
    generation: u64,
    arrived: usize,
    blocks: Vec<Option<Vec<u8>>>,
    layouts: Vec<Option<(Vec<CommSize>, Vec<CommSize>, CommSize)>>,
    result: Option<(u64, std::result::Result<Arc<Vec<u8>>, String>)>,
}

#[derive(Debug)]
struct InProcessHub {
    num_machines: usize,
    state: Mutex<HubState>,
    cond: Condvar,
}

impl InProcessHub {
    fn new(num_machines: usize) -> Self {
        InProcessHub {
            num_machines,
            state: Mutex::new(HubState {
                generation: 0,
                arrived: 0,
                blocks: vec![None; num_machines],
                layouts: vec![None; num_machines],
                result: None,
            }),
            cond: Condvar::new(),
        }
    }

    fn allgather(
        &self,
        rank: usize,
        input: &[u8],
        block_start: &[CommSize],
        block_len: &[CommSize],
        all_size: CommSize,
    ) -> Result<Vec<u8>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| LightGBMError::network("All-gather hub lock poisoned"))?;
        let my_generation = state.generation;
        state.blocks[rank] = Some(input.to_vec());
        state.layouts[rank] = Some((block_start.to_vec(), block_len.to_vec(), all_size));
        state.arrived += 1;

        if state.arrived == self.num_machines {
            let outcome = Self::assemble(&mut state).map(Arc::new);
            state.result = Some((my_generation, outcome));
            state.arrived = 0;
            state.generation += 1;
            self.cond.notify_all();
        } else {
            while state.generation == my_generation {
                state = self
                    .cond
                    .wait(state)
                    .map_err(|_| LightGBMError::network("All-gather hub lock poisoned"))?;
            }
        }

        match &state.result {
            Some((generation, Ok(bytes))) if *generation == my_generation => Ok(bytes.to_vec()),
            Some((generation, Err(message))) if *generation == my_generation => {
                Err(LightGBMError::network(message.clone()))
            }
            _ => Err(LightGBMError::network(
                "All-gather result was overwritten before it was read",
            )),
        }
    }

    fn assemble(state: &mut HubState) -> std::result::Result<Vec<u8>, String> {
        let layouts: Vec<_> = state.layouts.iter_mut().map(Option::take).collect();
        let blocks: Vec<_> = state.blocks.iter_mut().map(Option::take).collect();

        let reference = layouts
            .first()
            .and_then(|l| l.clone())
            .ok_or_else(|| "rank 0 did not join the all-gather".to_string())?;
        if let Some(rank) = layouts.iter().position(|l| l.as_ref() != Some(&reference)) {
            return Err(format!(
                "rank {} disagrees with rank 0 on the all-gather block layout",
                rank
            ));
        }

        let (block_start, block_len, all_size) = reference;
        let mut output = vec![0u8; all_size];
        for (rank, block) in blocks.into_iter().enumerate() {
            let block = block.ok_or_else(|| format!("rank {} did not contribute a block", rank))?;
            if block.len() != block_len[rank] {
                return Err(format!(
                    "rank {} contributed {} bytes, expected {}",
                    rank,
                    block.len(),
                    block_len[rank]
                ));
            }
            output[block_start[rank]..block_start[rank] + block_len[rank]].copy_from_slice(&block);
        }
        Ok(output)
    }
}
