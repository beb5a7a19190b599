mod drill_points;
