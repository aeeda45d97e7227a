//! Component combiner.
//!
//! Builds per-target views of buffered timeslices and tracks which entries
//! each target has already received.

use contracts::{Block, ControlSignals, ServerSettings, SplitMode, SystemId, Timeslice, TimesliceSource};
use ingestion::Ingestor;
use tracing::{debug, info, instrument};

use crate::buffer::TimesliceBuffer;
use crate::error::SplitError;
use crate::targets::{describe_systems, resolve_blocks, resolve_systems};

/// Per-system / per-block combiner
#[derive(Debug)]
pub struct SplitEngine {
    mode: SplitMode,
    blocks: Vec<Block>,
    buffer: TimesliceBuffer,
    /// Component positions per target, resolved on first use
    tables: Option<Vec<Vec<u32>>>,
}

impl SplitEngine {
    pub fn new(mode: SplitMode, blocks: Vec<Block>, high_water_mark: usize) -> Self {
        let target_count = Self::count_targets(mode, &blocks);
        Self {
            mode,
            blocks,
            buffer: TimesliceBuffer::new(high_water_mark, target_count),
            tables: None,
        }
    }

    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::new(settings.mode, settings.blocks.clone(), settings.high_water_mark)
    }

    fn count_targets(mode: SplitMode, blocks: &[Block]) -> usize {
        match mode {
            SplitMode::NoSplit => 0,
            SplitMode::PerSystem => contracts::SYSTEMS.len(),
            SplitMode::PerBlock => blocks.len(),
        }
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    pub fn target_count(&self) -> usize {
        Self::count_targets(self.mode, &self.blocks)
    }

    /// Target of a per-system request: numeric id first, then system name
    pub fn system_position(payload: &str) -> Option<usize> {
        SystemId::parse(payload)
            .and_then(SystemId::position)
            .or_else(|| SystemId::from_name(payload).and_then(SystemId::position))
    }

    /// Target of a per-block request
    pub fn block_position(&self, name: &str) -> Option<usize> {
        let name = name.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        self.blocks.iter().position(|b| b.name == name)
    }

    pub fn buffer(&self) -> &TimesliceBuffer {
        &self.buffer
    }

    /// Fetch one timeslice into the buffer
    pub async fn prefetch<S, C>(
        &mut self,
        ingestor: &mut Ingestor<S>,
        signals: &mut C,
    ) -> Result<bool, SplitError>
    where
        S: TimesliceSource,
        C: ControlSignals,
    {
        self.buffer.push_new(ingestor, signals).await
    }

    /// Next view of the stream for `target`
    ///
    /// The oldest entry not yet served to `target` is used; when there is
    /// none a new timeslice is fetched.
    ///
    /// # Errors
    /// [`SplitError::Exhausted`] when nothing is left to serve.
    #[instrument(name = "split_combine", skip(self, ingestor, signals), fields(mode = self.mode.as_str()))]
    pub async fn combine<S, C>(
        &mut self,
        target: usize,
        ingestor: &mut Ingestor<S>,
        signals: &mut C,
    ) -> Result<Timeslice, SplitError>
    where
        S: TimesliceSource,
        C: ControlSignals,
    {
        let count = self.target_count();
        if target >= count {
            return Err(SplitError::UnknownTarget { target, count });
        }

        self.ensure_tables(ingestor, signals).await?;
        let components = match self.tables.as_ref().and_then(|t| t.get(target)) {
            Some(components) if !components.is_empty() => components.clone(),
            _ => {
                debug!(target, "target has no components");
                return Ok(Timeslice::default());
            }
        };

        let pos = match self.buffer.first_unserved(target) {
            Some(pos) => pos,
            None => {
                if !self.buffer.push_new(ingestor, signals).await? {
                    return Err(SplitError::Exhausted);
                }
                self.buffer.len() - 1
            }
        };

        let view = self
            .buffer
            .timeslice(pos)
            .map(|ts| ts.select_components(&components))
            .ok_or(SplitError::Exhausted)?;
        self.buffer.mark_served(pos, target);

        debug!(target, index = view.index, components = view.num_components(), "combined timeslice");
        Ok(view)
    }

    async fn ensure_tables<S, C>(
        &mut self,
        ingestor: &mut Ingestor<S>,
        signals: &mut C,
    ) -> Result<(), SplitError>
    where
        S: TimesliceSource,
        C: ControlSignals,
    {
        if self.tables.is_some() {
            return Ok(());
        }

        if self.buffer.is_empty() && !self.buffer.push_new(ingestor, signals).await? {
            return Err(SplitError::Exhausted);
        }
        let Some(first) = self.buffer.front() else {
            return Err(SplitError::Exhausted);
        };

        let systems = resolve_systems(first);
        info!(
            index = first.index,
            components = first.num_components(),
            table = %describe_systems(&systems),
            "component table resolved"
        );

        let tables = match self.mode {
            SplitMode::PerBlock => {
                let blocks = resolve_blocks(&systems, &self.blocks);
                for (block, positions) in self.blocks.iter().zip(&blocks) {
                    info!(block = %block.name, components = ?positions, "block components");
                }
                blocks
            }
            _ => systems,
        };
        self.tables = Some(tables);
        Ok(())
    }
}
