mod differ;

pub use differ::PayloadDiffer;
