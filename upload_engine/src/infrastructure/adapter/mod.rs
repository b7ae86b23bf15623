pub mod mock_adapter;

pub use mock_adapter::MockRequestAdapter;
