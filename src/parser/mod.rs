pub mod musicxml;
