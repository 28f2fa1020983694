use crate::contract::Contract;
use crate::state::ContractStatus;

/// Events published by the `ContractRegistry` on its broadcast channel.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A contract was posted.
    Created(Contract),
    /// A lifecycle transition was committed.
    StatusChanged {
        contract_id: String,
        from: ContractStatus,
        to: ContractStatus,
    },
    /// The contract completed but the payout did not go through.
    /// The contract stays `completed`.
    PaymentFailed { contract_id: String, reason: String },
}
