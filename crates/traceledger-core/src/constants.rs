pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Proof carried by the genesis block.
pub const GENESIS_PROOF: u64 = 100;
/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Number of leading `POW_DIGIT` characters a guess hash must start with.
pub const POW_TARGET_DIFFICULTY: usize = 4;
pub const POW_DIGIT: char = '0';
