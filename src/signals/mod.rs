pub mod botness;
