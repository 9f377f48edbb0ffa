pub mod keyed_hash;
