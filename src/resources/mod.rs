/**
 * This module contains the logic for producing mesh data and the CPU-side
 * resources a model is built from.
 */
pub mod mesh;
