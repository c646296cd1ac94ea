mod two_phase;
