mod test_glare_convergence;
mod test_reset;
