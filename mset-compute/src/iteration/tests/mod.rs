mod helpers;

mod in_play;
