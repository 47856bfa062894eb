//! In-memory token ledger that serves `CALL` / `STATICCALL` to registered token contracts.

use std::{collections::BTreeMap, sync::OnceLock};

use enforcer_interface::{TokenRecord, TokenType};
use enum_dispatch::enum_dispatch;
use primitive_types::{H160, H256, U256};
use tracing::trace;

use crate::{
    hash::{h256_to_u256, keccak256, u256_to_h256, ZERO},
    world::{CallOutcome, ExternalCall, World},
};

/// `(token address, owner)` for fungible balances, `(token address, token id)` otherwise.
type RecordKey = (H160, U256);

fn address_to_u256(address: H160) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

fn u256_to_address(value: U256) -> H160 {
    H160::from(u256_to_h256(value))
}

fn record_key(record: &TokenRecord) -> RecordKey {
    match record.token_type {
        TokenType::Erc20 => (record.address, address_to_u256(record.owner)),
        TokenType::Erc721 | TokenType::Erc1948 => (record.address, record.value),
    }
}

/// Token ledger keyed by `(tokenAddress, ownerOrTokenId)`.
///
/// An elided bag only knows its hash; it results from a one-step proof of an instruction that
/// does not reach the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBag {
    records: BTreeMap<RecordKey, TokenRecord>,
    hash: H256,
    elided: bool,
}

impl TokenBag {
    /// Creates a ledger from a snapshot. Later records replace earlier ones with the same key.
    pub fn new(records: impl IntoIterator<Item = TokenRecord>) -> Self {
        let mut bag = Self {
            records: records
                .into_iter()
                .map(|record| (record_key(&record), record))
                .collect(),
            hash: ZERO,
            elided: false,
        };
        bag.rehash();
        bag
    }

    /// Ledger known only by its commitment.
    pub fn elided(hash: H256) -> Self {
        Self {
            records: BTreeMap::new(),
            hash,
            elided: true,
        }
    }

    /// Checks whether the records are unavailable.
    pub fn is_elided(&self) -> bool {
        self.elided
    }

    /// Fungible balance of `owner`, or the number of tokens it holds for non-fungible kinds.
    pub fn balance_of(&self, token: H160, owner: H160) -> U256 {
        match self.token_type(token) {
            Some(TokenType::Erc20) => self
                .records
                .get(&(token, address_to_u256(owner)))
                .map_or_else(U256::zero, |record| record.value),
            Some(_) => self
                .tokens(token)
                .filter(|record| record.owner == owner)
                .count()
                .into(),
            None => U256::zero(),
        }
    }

    /// Current owner of a non-fungible token.
    pub fn owner_of(&self, token: H160, token_id: U256) -> Option<H160> {
        match self.token_type(token)? {
            TokenType::Erc20 => None,
            _ => self.records.get(&(token, token_id)).map(|record| record.owner),
        }
    }

    fn token_type(&self, token: H160) -> Option<TokenType> {
        self.tokens(token).next().map(|record| record.token_type)
    }

    fn tokens(&self, token: H160) -> impl Iterator<Item = &TokenRecord> {
        self.records
            .range((token, U256::zero())..=(token, U256::MAX))
            .map(|(_, record)| record)
    }

    fn rehash(&mut self) {
        self.hash = if self.records.is_empty() {
            ZERO
        } else {
            let mut encoded = Vec::with_capacity(self.records.len() * 128);
            for record in self.records.values() {
                encode_record(record, &mut encoded);
            }
            keccak256(&encoded)
        };
    }
}

/// Packs a record:
/// `address ‖ owner ‖ value ‖ data ‖ type ‖ approved ‖ #allowances ‖ (spender ‖ amount)*`.
fn encode_record(record: &TokenRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(record.address.as_bytes());
    out.extend_from_slice(record.owner.as_bytes());
    out.extend_from_slice(u256_to_h256(record.value).as_bytes());
    out.extend_from_slice(record.data.as_bytes());
    out.push(record.token_type as u8);
    out.extend_from_slice(record.approved.unwrap_or_default().as_bytes());
    out.extend_from_slice(u256_to_h256(record.allowances.len().into()).as_bytes());
    for (spender, amount) in &record.allowances {
        out.extend_from_slice(spender.as_bytes());
        out.extend_from_slice(u256_to_h256(*amount).as_bytes());
    }
}

impl World for TokenBag {
    fn environment_hash(&self) -> H256 {
        self.hash
    }

    fn call(&mut self, call: &ExternalCall<'_>) -> Option<CallOutcome> {
        if self.elided {
            return None;
        }
        let standard = Standard::from(self.token_type(call.target)?);
        let Some((method, args)) = Method::decode(call.input) else {
            trace!(target = ?call.target, "unknown token method");
            return Some(CallOutcome::failure());
        };
        if call.is_static && method.is_write() {
            return Some(CallOutcome::failure());
        }

        // Work on a copy so that a failing call leaves no partial effects.
        let mut records = self.records.clone();
        let Some(return_data) =
            standard.invoke(&mut records, call.target, call.sender, method, &args)
        else {
            return Some(CallOutcome::failure());
        };
        if method.is_write() {
            self.records = records;
            self.rehash();
        }
        Some(CallOutcome::success(return_data))
    }

    fn records(&self) -> Vec<TokenRecord> {
        self.records.values().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    BalanceOf,
    OwnerOf,
    Allowance,
    GetApproved,
    Approve,
    Transfer,
    TransferFrom,
    ReadData,
    WriteData,
}

impl Method {
    const SIGNATURES: [(Self, &'static str, usize); 9] = [
        (Self::BalanceOf, "balanceOf(address)", 1),
        (Self::OwnerOf, "ownerOf(uint256)", 1),
        (Self::Allowance, "allowance(address,address)", 2),
        (Self::GetApproved, "getApproved(uint256)", 1),
        (Self::Approve, "approve(address,uint256)", 2),
        (Self::Transfer, "transfer(address,uint256)", 2),
        (Self::TransferFrom, "transferFrom(address,address,uint256)", 3),
        (Self::ReadData, "readData(uint256)", 1),
        (Self::WriteData, "writeData(uint256,bytes32)", 2),
    ];

    fn selectors() -> &'static [([u8; 4], Self, usize)] {
        static SELECTORS: OnceLock<Vec<([u8; 4], Method, usize)>> = OnceLock::new();
        SELECTORS.get_or_init(|| {
            Self::SIGNATURES
                .iter()
                .map(|&(method, signature, arity)| (selector(signature), method, arity))
                .collect()
        })
    }

    /// Splits call input into the method and its 32-byte arguments.
    fn decode(input: &[u8]) -> Option<(Self, Vec<U256>)> {
        let (selector, args) = input.split_first_chunk::<4>()?;
        let &(_, method, arity) = Self::selectors()
            .iter()
            .find(|(candidate, ..)| candidate == selector)?;
        if args.len() < arity * 32 {
            return None;
        }
        let args = args
            .chunks_exact(32)
            .take(arity)
            .map(U256::from_big_endian)
            .collect();
        Some((method, args))
    }

    fn is_write(self) -> bool {
        matches!(
            self,
            Self::Approve | Self::Transfer | Self::TransferFrom | Self::WriteData
        )
    }
}

pub(crate) fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn encode_word(value: U256) -> Vec<u8> {
    u256_to_h256(value).as_bytes().to_vec()
}

fn encode_true() -> Vec<u8> {
    encode_word(U256::one())
}

type Records = BTreeMap<RecordKey, TokenRecord>;

/// Behaviour of one token standard.
#[enum_dispatch]
trait TokenStandard {
    /// Runs `method`; `None` makes the call fail.
    fn invoke(
        &self,
        records: &mut Records,
        token: H160,
        sender: H160,
        method: Method,
        args: &[U256],
    ) -> Option<Vec<u8>>;
}

#[enum_dispatch(TokenStandard)]
#[derive(Debug, Clone, Copy)]
enum Standard {
    Fungible,
    NonFungible,
    DataToken,
}

impl From<TokenType> for Standard {
    fn from(token_type: TokenType) -> Self {
        match token_type {
            TokenType::Erc20 => Self::Fungible(Fungible),
            TokenType::Erc721 => Self::NonFungible(NonFungible),
            TokenType::Erc1948 => Self::DataToken(DataToken),
        }
    }
}

/// ERC20 balances and allowances.
#[derive(Debug, Clone, Copy)]
struct Fungible;

impl Fungible {
    fn balance(records: &Records, token: H160, owner: H160) -> U256 {
        records
            .get(&(token, address_to_u256(owner)))
            .map_or_else(U256::zero, |record| record.value)
    }

    fn account(records: &mut Records, token: H160, owner: H160) -> &mut TokenRecord {
        records
            .entry((token, address_to_u256(owner)))
            .or_insert_with(|| TokenRecord::erc20(token, owner, U256::zero()))
    }

    fn move_balance(
        records: &mut Records,
        token: H160,
        from: H160,
        to: H160,
        amount: U256,
    ) -> Option<()> {
        let remaining = Self::balance(records, token, from).checked_sub(amount)?;
        let received = Self::balance(records, token, to).checked_add(amount)?;
        if from != to {
            Self::account(records, token, from).value = remaining;
            Self::account(records, token, to).value = received;
        }
        Some(())
    }
}

impl TokenStandard for Fungible {
    fn invoke(
        &self,
        records: &mut Records,
        token: H160,
        sender: H160,
        method: Method,
        args: &[U256],
    ) -> Option<Vec<u8>> {
        match method {
            Method::BalanceOf => Some(encode_word(Self::balance(
                records,
                token,
                u256_to_address(args[0]),
            ))),
            Method::Allowance => {
                let owner = u256_to_address(args[0]);
                let spender = u256_to_address(args[1]);
                let allowance = records
                    .get(&(token, address_to_u256(owner)))
                    .and_then(|record| record.allowances.get(&spender).copied())
                    .unwrap_or_default();
                Some(encode_word(allowance))
            }
            Method::Approve => {
                let spender = u256_to_address(args[0]);
                let account = Self::account(records, token, sender);
                if args[1].is_zero() {
                    account.allowances.remove(&spender);
                } else {
                    account.allowances.insert(spender, args[1]);
                }
                Some(encode_true())
            }
            Method::Transfer => {
                Self::move_balance(records, token, sender, u256_to_address(args[0]), args[1])?;
                Some(encode_true())
            }
            Method::TransferFrom => {
                let from = u256_to_address(args[0]);
                let amount = args[2];
                if sender != from {
                    let allowance = records
                        .get(&(token, address_to_u256(from)))
                        .and_then(|record| record.allowances.get(&sender).copied())
                        .unwrap_or_default()
                        .checked_sub(amount)?;
                    if Self::balance(records, token, from) < amount {
                        return None;
                    }
                    let account = Self::account(records, token, from);
                    if allowance.is_zero() {
                        account.allowances.remove(&sender);
                    } else {
                        account.allowances.insert(sender, allowance);
                    }
                }
                Self::move_balance(records, token, from, u256_to_address(args[1]), amount)?;
                Some(encode_true())
            }
            Method::OwnerOf | Method::GetApproved | Method::ReadData | Method::WriteData => None,
        }
    }
}

/// ERC721 ownership and approvals.
#[derive(Debug, Clone, Copy)]
struct NonFungible;

impl NonFungible {
    fn transfer(
        records: &mut Records,
        token: H160,
        sender: H160,
        from: H160,
        to: H160,
        token_id: U256,
    ) -> Option<()> {
        let record = records.get_mut(&(token, token_id))?;
        let authorised = sender == record.owner || record.approved == Some(sender);
        if record.owner != from || !authorised || to.is_zero() {
            return None;
        }
        record.owner = to;
        record.approved = None;
        Some(())
    }
}

impl TokenStandard for NonFungible {
    fn invoke(
        &self,
        records: &mut Records,
        token: H160,
        sender: H160,
        method: Method,
        args: &[U256],
    ) -> Option<Vec<u8>> {
        match method {
            Method::BalanceOf => {
                let owner = u256_to_address(args[0]);
                let count = records
                    .range((token, U256::zero())..=(token, U256::MAX))
                    .filter(|(_, record)| record.owner == owner)
                    .count();
                Some(encode_word(count.into()))
            }
            Method::OwnerOf => {
                let record = records.get(&(token, args[0]))?;
                Some(encode_word(address_to_u256(record.owner)))
            }
            Method::GetApproved => {
                let record = records.get(&(token, args[0]))?;
                Some(encode_word(record.approved.map_or_else(U256::zero, address_to_u256)))
            }
            Method::Approve => {
                let approved = u256_to_address(args[0]);
                let record = records.get_mut(&(token, args[1]))?;
                if record.owner != sender {
                    return None;
                }
                record.approved = (!approved.is_zero()).then_some(approved);
                Some(encode_true())
            }
            Method::Transfer => {
                Self::transfer(records, token, sender, sender, u256_to_address(args[0]), args[1])?;
                Some(encode_true())
            }
            Method::TransferFrom => {
                let from = u256_to_address(args[0]);
                let to = u256_to_address(args[1]);
                Self::transfer(records, token, sender, from, to, args[2])?;
                Some(encode_true())
            }
            Method::Allowance | Method::ReadData | Method::WriteData => None,
        }
    }
}

/// ERC1948: a non-fungible token with 32 bytes of owner-writable data.
#[derive(Debug, Clone, Copy)]
struct DataToken;

impl TokenStandard for DataToken {
    fn invoke(
        &self,
        records: &mut Records,
        token: H160,
        sender: H160,
        method: Method,
        args: &[U256],
    ) -> Option<Vec<u8>> {
        match method {
            Method::ReadData => {
                let record = records.get(&(token, args[0]))?;
                Some(record.data.as_bytes().to_vec())
            }
            Method::WriteData => {
                let record = records.get_mut(&(token, args[0]))?;
                if record.owner != sender {
                    return None;
                }
                record.data = u256_to_h256(args[1]);
                Some(encode_true())
            }
            _ => NonFungible.invoke(records, token, sender, method, args),
        }
    }
}

/// Encodes a token call the way a compiler would: selector followed by 32-byte words.
pub fn encode_call(signature: &str, args: &[U256]) -> Vec<u8> {
    let mut input = selector(signature).to_vec();
    for arg in args {
        input.extend_from_slice(u256_to_h256(*arg).as_bytes());
    }
    input
}

/// Decodes a 32-byte word as returned by a token call.
pub fn decode_word(data: &[u8]) -> Option<U256> {
    (data.len() >= 32).then(|| h256_to_u256(&H256::from_slice(&data[..32])))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: H160 = H160::repeat_byte(0xee);
    const ALICE: H160 = H160::repeat_byte(0xa1);
    const BOB: H160 = H160::repeat_byte(0xb0);

    fn call(bag: &mut TokenBag, sender: H160, input: &[u8], is_static: bool) -> CallOutcome {
        bag.call(&ExternalCall {
            target: TOKEN,
            sender,
            input,
            is_static,
        })
        .expect("token call is intercepted")
    }

    fn addr(address: H160) -> U256 {
        address_to_u256(address)
    }

    #[test]
    fn erc20_transfer_moves_balance() {
        let mut bag = TokenBag::new([TokenRecord::erc20(TOKEN, ALICE, 100.into())]);
        let before = bag.environment_hash();

        let input = encode_call("transfer(address,uint256)", &[addr(BOB), 30.into()]);
        let outcome = call(&mut bag, ALICE, &input, false);
        assert!(outcome.success);
        assert_eq!(decode_word(&outcome.return_data), Some(U256::one()));
        assert_eq!(bag.balance_of(TOKEN, ALICE), 70.into());
        assert_eq!(bag.balance_of(TOKEN, BOB), 30.into());
        assert_ne!(bag.environment_hash(), before);

        let overdraw = encode_call("transfer(address,uint256)", &[addr(BOB), 71.into()]);
        assert!(!call(&mut bag, ALICE, &overdraw, false).success);
    }

    #[test]
    fn static_calls_cannot_write() {
        let mut bag = TokenBag::new([TokenRecord::erc20(TOKEN, ALICE, 100.into())]);
        let before = bag.clone();
        let input = encode_call("transfer(address,uint256)", &[addr(BOB), 1.into()]);
        assert!(!call(&mut bag, ALICE, &input, true).success);
        assert_eq!(bag, before);

        let query = encode_call("balanceOf(address)", &[addr(ALICE)]);
        let outcome = call(&mut bag, BOB, &query, true);
        assert_eq!(decode_word(&outcome.return_data), Some(100.into()));
    }

    #[test]
    fn erc20_allowances() {
        let mut bag = TokenBag::new([TokenRecord::erc20(TOKEN, ALICE, 50.into())]);
        let approve = encode_call("approve(address,uint256)", &[addr(BOB), 20.into()]);
        assert!(call(&mut bag, ALICE, &approve, false).success);

        let pull = encode_call(
            "transferFrom(address,address,uint256)",
            &[addr(ALICE), addr(BOB), 15.into()],
        );
        assert!(call(&mut bag, BOB, &pull, false).success);
        assert!(!call(&mut bag, BOB, &pull, false).success);

        let query = encode_call("allowance(address,address)", &[addr(ALICE), addr(BOB)]);
        let outcome = call(&mut bag, BOB, &query, true);
        assert_eq!(decode_word(&outcome.return_data), Some(5.into()));
        assert_eq!(bag.balance_of(TOKEN, BOB), 15.into());
    }

    #[test]
    fn nft_ownership_and_data() {
        let mut bag = TokenBag::new([TokenRecord::erc1948(TOKEN, ALICE, 7.into(), H256::zero())]);
        let write = encode_call("writeData(uint256,bytes32)", &[7.into(), 0xabcd.into()]);
        assert!(!call(&mut bag, BOB, &write, false).success);
        assert!(call(&mut bag, ALICE, &write, false).success);

        let read = encode_call("readData(uint256)", &[7.into()]);
        let outcome = call(&mut bag, BOB, &read, true);
        assert_eq!(decode_word(&outcome.return_data), Some(0xabcd.into()));

        let approve = encode_call("approve(address,uint256)", &[addr(BOB), 7.into()]);
        assert!(call(&mut bag, ALICE, &approve, false).success);
        let take = encode_call(
            "transferFrom(address,address,uint256)",
            &[addr(ALICE), addr(BOB), 7.into()],
        );
        assert!(call(&mut bag, BOB, &take, false).success);
        assert_eq!(bag.owner_of(TOKEN, 7.into()), Some(BOB));
        assert_eq!(bag.balance_of(TOKEN, BOB), U256::one());
    }

    #[test]
    fn unknown_targets_are_not_intercepted() {
        let mut bag = TokenBag::new([TokenRecord::erc20(TOKEN, ALICE, 1.into())]);
        let outcome = bag.call(&ExternalCall {
            target: BOB,
            sender: ALICE,
            input: &[],
            is_static: false,
        });
        assert_eq!(outcome, None);
        assert_eq!(TokenBag::default().environment_hash(), ZERO);
    }

    #[test]
    fn snapshot_round_trip_preserves_hash() {
        let bag = TokenBag::new([
            TokenRecord::erc721(TOKEN, BOB, 2.into()),
            TokenRecord::erc721(TOKEN, ALICE, 1.into()),
        ]);
        let restored = TokenBag::new(bag.records());
        assert_eq!(restored.environment_hash(), bag.environment_hash());
        assert_eq!(restored.owner_of(TOKEN, 1.into()), Some(ALICE));
    }

    #[test]
    fn random_transfers_conserve_supply() {
        use rand::Rng;

        let holders = [ALICE, BOB, H160::repeat_byte(0xc0)];
        let mut bag = TokenBag::new([TokenRecord::erc20(TOKEN, ALICE, 1_000.into())]);
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let from = holders[rng.gen_range(0..holders.len())];
            let to = holders[rng.gen_range(0..holders.len())];
            let amount = rng.gen_range(0..400_u64);
            let before = bag.balance_of(TOKEN, from);

            let input = encode_call("transfer(address,uint256)", &[addr(to), amount.into()]);
            let outcome = call(&mut bag, from, &input, false);
            assert_eq!(outcome.success, before >= U256::from(amount));

            let supply = holders
                .iter()
                .fold(U256::zero(), |sum, &holder| sum + bag.balance_of(TOKEN, holder));
            assert_eq!(supply, 1_000.into());
        }
    }
}
