use anyhow::Result;

use crate::allocator::chunk::{ChunkHandle, WORD_SIZE};
use crate::allocator::traits::ChunkAllocator;
use crate::block::Block;
use crate::core::queue::{PhysicalAddress, QueueSlot, SubmissionQueue};
use crate::core::settings::QueueSettings;
use crate::util::align::is_aligned;
use crate::Error;

/// Write position inside the chunk currently being recorded into.
#[derive(Debug)]
struct Cursor {
    first: ChunkHandle,
    chunk: ChunkHandle,
    chunk_count: usize,
    capacity: usize,
    position: usize,
    /// Last position a command may start at. Always a full command short of the chunk end.
    boundary: usize,
}

/// The range entry last written to the submission queue, kept so an adjacent range can extend it.
#[derive(Debug, Copy, Clone)]
struct BackPatch {
    chunk: ChunkHandle,
    end: PhysicalAddress,
    slot: QueueSlot,
    /// Queue position right after the range entry. Anything queued since then prevents patching.
    queue_position: QueueSlot,
}

/// Records commands into a chain of chunks. See the [module documentation](crate::block).
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct BlockRecorder<A: ChunkAllocator> {
    #[derivative(Debug = "ignore")]
    allocator: A,
    min_chunk_words: usize,
    max_chunk_words: usize,
    max_command_words: usize,
    active: bool,
    cursor: Option<Cursor>,
    memo: Option<BackPatch>,
}

impl<A: ChunkAllocator> BlockRecorder<A> {
    /// Create a recorder drawing chunks from `allocator`, sized according to `settings`.
    pub fn new(allocator: A, settings: &QueueSettings) -> Self {
        Self {
            allocator,
            min_chunk_words: settings.min_chunk_words,
            max_chunk_words: settings.max_chunk_words,
            max_command_words: settings.max_command_words,
            active: false,
            cursor: None,
            memo: None,
        }
    }

    /// Start recording. No chunk is allocated until the first write.
    /// # Panics
    /// Panics if a block is already being recorded.
    pub fn begin(&mut self) {
        assert!(!self.active, "a block is already being recorded");
        self.active = true;
    }

    /// Stop recording. Returns the recorded block, or `None` if nothing was written since [`Self::begin()`].
    /// # Panics
    /// Panics if no block is being recorded.
    pub fn end(&mut self) -> Option<Block> {
        assert!(self.active, "no block is being recorded");
        self.active = false;
        self.memo = None;
        let cursor = self.cursor.take()?;
        self.commit_len(&cursor);
        debug!("Finished recording block of {} chunk(s)", cursor.chunk_count);
        Some(Block {
            first: cursor.first,
            chunk_count: cursor.chunk_count,
        })
    }

    /// Whether commands are currently being recorded.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Capacity of the chunk currently recorded into, if a block has been created.
    pub fn current_capacity(&self) -> Option<usize> {
        self.cursor.as_ref().map(|cursor| cursor.capacity)
    }

    /// Write position and boundary inside the current chunk, if a block has been created.
    pub fn cursor(&self) -> Option<(usize, usize)> {
        self.cursor.as_ref().map(|cursor| (cursor.position, cursor.boundary))
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    /// Get the block ready for the next command: create it if this is the first write since
    /// [`Self::begin()`], or grow it if a previous write left the cursor past the boundary.
    /// Does nothing while not recording.
    /// # Errors
    /// * Fails if the chunk cannot be allocated.
    pub fn ensure_block<Q: SubmissionQueue>(&mut self, queue: &mut Q) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        if self.cursor.is_some() {
            return self.reserve(queue);
        }

        let chunk = self.allocator.allocate(self.min_chunk_words)?;
        self.memo = None;
        let start = self.switch_buffer(queue, chunk, self.min_chunk_words, None)?;
        queue.begin_static_block(start);
        debug!("Created block at {:#x} with {} words", start, self.min_chunk_words);
        Ok(())
    }

    /// Write one command at the cursor and announce it to the queue.
    ///
    /// The chunk grows as soon as the cursor passes the boundary. If that allocation fails, the
    /// command that crossed the boundary is still recorded and the growth is retried before the next
    /// write. An `Err` therefore always means nothing was recorded.
    /// # Errors
    /// * Fails if growth is pending and the allocator is still out of memory.
    /// # Panics
    /// Panics if no block was created or the command is larger than the tail margin.
    pub fn write<Q: SubmissionQueue>(&mut self, queue: &mut Q, words: impl IntoIterator<Item = u64>) -> Result<()> {
        self.reserve(queue)?;
        let cursor = self.cursor.as_ref().expect("static write without an active block");
        let (chunk, start) = (cursor.chunk, cursor.position);
        let margin = self.max_command_words;

        let storage = self
            .allocator
            .chunk_mut(chunk)
            .ok_or(Error::ChunkNotFound)?
            .storage_mut();
        let mut end = start;
        for word in words {
            assert!(end - start < margin, "command exceeds the maximum of {} words", margin);
            storage[end] = word;
            end += 1;
        }

        self.flush(queue, start, end)?;
        self.advance(queue, end - start);
        Ok(())
    }

    /// Reserve `count` words at the cursor without announcing them. The submission queue fills them in
    /// at replay time.
    /// The placeholder belongs to the command being written, so no pending growth is attempted first.
    /// # Panics
    /// Panics if no block was created, or if the placeholder runs past the end of the chunk.
    pub fn skip<Q: SubmissionQueue>(&mut self, queue: &mut Q, count: usize) {
        assert!(count <= self.max_command_words, "placeholder exceeds the maximum of {} words", self.max_command_words);
        let cursor = self.cursor.as_ref().expect("static skip without an active block");
        assert!(cursor.position + count <= cursor.capacity, "placeholder runs past the end of the chunk");
        self.advance(queue, count);
    }

    /// Free every chunk of a finished block.
    /// # Errors
    /// * Fails if a chunk of the chain is no longer allocated.
    pub fn free(&mut self, block: Block) -> Result<()> {
        let mut next = Some(block.first);
        while let Some(handle) = next {
            next = self.allocator.chunk(handle).ok_or(Error::ChunkNotFound)?.next();
            self.allocator.free(handle)?;
        }
        debug!("Freed block of {} chunk(s)", block.chunk_count);
        Ok(())
    }

    /// Grow the block if a previous write left the cursor past the boundary. Nothing is written
    /// before this succeeds, so no command ever starts past the boundary.
    fn reserve<Q: SubmissionQueue>(&mut self, queue: &mut Q) -> Result<()> {
        let cursor = self.cursor.as_ref().expect("static write without an active block");
        if cursor.position > cursor.boundary {
            self.next_buffer(queue)?;
        }
        Ok(())
    }

    fn advance<Q: SubmissionQueue>(&mut self, queue: &mut Q, count: usize) {
        let cursor = self.cursor.as_mut().expect("static write without an active block");
        cursor.position += count;
        if cursor.position > cursor.boundary {
            if let Err(err) = self.next_buffer(queue) {
                warn!("Could not grow block, retrying before the next write: {}", err);
            }
        }
    }

    /// Announce the words in `[start, end)` of the current chunk to the queue, extending the previous
    /// range entry when possible.
    fn flush<Q: SubmissionQueue>(&mut self, queue: &mut Q, start: usize, end: usize) -> Result<()> {
        let cursor = self.cursor.as_ref().expect("flush without an active block");
        let chunk = self.allocator.chunk(cursor.chunk).ok_or(Error::ChunkNotFound)?;
        let (start_address, end_address) = (chunk.address_of(start), chunk.address_of(end));
        assert!(is_aligned(start_address, WORD_SIZE), "start not aligned to 8 bytes: {:#x}", start_address);
        assert!(is_aligned(end_address, WORD_SIZE), "end not aligned to 8 bytes: {:#x}", end_address);

        let current = cursor.chunk;
        let position = queue.position();
        if let Some(memo) = self
            .memo
            .as_mut()
            .filter(|memo| memo.chunk == current && memo.end == start_address && memo.queue_position == position)
        {
            trace!("Extending range entry {:?} to {:#x}", memo.slot, end_address);
            queue.patch_range(memo.slot, end_address);
            memo.end = end_address;
            return Ok(());
        }

        let slot = queue.write_range(start_address, end_address);
        self.memo = Some(BackPatch {
            chunk: current,
            end: end_address,
            slot,
            queue_position: queue.position(),
        });
        Ok(())
    }

    /// Link a new chunk after the current one and continue recording there.
    fn next_buffer<Q: SubmissionQueue>(&mut self, queue: &mut Q) -> Result<()> {
        let cursor = self.cursor.take().expect("growing without an active block");
        self.commit_len(&cursor);

        let capacity = (cursor.capacity * 2).min(self.max_chunk_words);
        let chunk = match self.allocator.allocate(capacity) {
            Ok(chunk) => chunk,
            Err(err) => {
                self.cursor = Some(cursor);
                return Err(err);
            }
        };
        self.allocator
            .chunk_mut(cursor.chunk)
            .ok_or(Error::ChunkNotFound)?
            .set_next(Some(chunk));

        // Range entries cannot be extended across chunks.
        self.memo = None;
        debug!("Block grew to {} chunk(s), new chunk holds {} words", cursor.chunk_count + 1, capacity);
        self.switch_buffer(queue, chunk, capacity, Some(&cursor))?;
        Ok(())
    }

    /// Point the cursor at the start of `chunk` and queue an empty range there, so that the queue's
    /// notion of the current replay address follows into the new chunk. Returns the chunk address.
    fn switch_buffer<Q: SubmissionQueue>(
        &mut self,
        queue: &mut Q,
        chunk: ChunkHandle,
        capacity: usize,
        previous: Option<&Cursor>,
    ) -> Result<PhysicalAddress> {
        assert!(
            capacity > self.max_command_words,
            "chunk of {} words cannot hold a command of {} words",
            capacity,
            self.max_command_words
        );

        self.cursor = Some(Cursor {
            first: previous.map_or(chunk, |previous| previous.first),
            chunk,
            chunk_count: previous.map_or(1, |previous| previous.chunk_count + 1),
            capacity,
            position: 0,
            boundary: capacity - self.max_command_words,
        });
        self.flush(queue, 0, 0)?;
        Ok(self.allocator.chunk(chunk).ok_or(Error::ChunkNotFound)?.address())
    }

    /// Record how much of the cursor's chunk was used, so the block can be read back.
    fn commit_len(&mut self, cursor: &Cursor) {
        if let Some(chunk) = self.allocator.chunk_mut(cursor.chunk) {
            chunk.set_len(cursor.position.min(cursor.capacity));
        }
    }
}
